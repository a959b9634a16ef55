//! The signed-in identity and its credential lifecycle.

use std::error::Error;
use std::fmt::{self, Debug, Display};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use folio_api::Credential;

use crate::store::{CREDENTIAL_KEY, Store};

/// The message shown when an operation needs a credential and there is no
/// valid one.
pub const SIGN_IN_REQUIRED: &str = "Sign-in expired. Please sign in again.";

/// Error returned when an operation needs a valid credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignInRequired;

impl Display for SignInRequired {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(SIGN_IN_REQUIRED)
    }
}

impl Error for SignInRequired {}

struct Inner {
    store: Arc<dyn Store>,
    credential: Mutex<Option<Credential>>,
}

/// The session of the signed-in user.
///
/// An `Identity` owns the bearer credential and mirrors it into the durable
/// store. Clones share the same credential.
#[derive(Clone)]
pub struct Identity {
    inner: Arc<Inner>,
}

impl Identity {
    /// Restores the identity from the store.
    ///
    /// A stored credential that has already expired is discarded and
    /// removed from the store.
    pub fn rehydrate(store: Arc<dyn Store>) -> Self {
        let credential = match store.get(CREDENTIAL_KEY) {
            Some(token) => {
                let credential = Credential::new(token);
                if credential.is_expired() {
                    info!("stored credential has expired, discarding it");
                    store.remove(CREDENTIAL_KEY);
                    None
                } else {
                    debug!("restored credential {credential:?}");
                    Some(credential)
                }
            }
            None => None,
        };
        Self {
            inner: Arc::new(Inner {
                store,
                credential: Mutex::new(credential),
            }),
        }
    }

    /// Returns the store the identity persists to.
    #[inline]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.inner.store
    }

    /// Signs in with a credential issued by the identity provider.
    ///
    /// An expired credential is refused and leaves the current one in
    /// place.
    pub fn sign_in(&self, credential: Credential) -> Result<(), SignInRequired> {
        if credential.is_expired() {
            warn!("refusing an expired credential");
            return Err(SignInRequired);
        }
        self.inner.store.set(CREDENTIAL_KEY, credential.token());
        info!("signed in, credential expires at {:?}", credential.expires_at());
        *self.lock() = Some(credential);
        Ok(())
    }

    /// Forgets the credential, in memory and in the store.
    pub fn sign_out(&self) {
        if self.lock().take().is_some() {
            info!("signed out");
        }
        self.inner.store.remove(CREDENTIAL_KEY);
    }

    /// Returns whether there is a credential that has not expired yet.
    pub fn is_signed_in(&self) -> bool {
        self.lock().as_ref().is_some_and(|c| !c.is_expired())
    }

    /// Returns the credential if it is still valid.
    ///
    /// An expired credential is torn down on the way, so callers never
    /// send it to the backend.
    pub fn valid_credential(&self) -> Result<Credential, SignInRequired> {
        let mut credential = self.lock();
        match credential.as_ref() {
            Some(c) if !c.is_expired() => Ok(c.clone()),
            Some(_) => {
                info!("credential has expired");
                *credential = None;
                drop(credential);
                self.inner.store.remove(CREDENTIAL_KEY);
                Err(SignInRequired)
            }
            None => Err(SignInRequired),
        }
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, Option<Credential>> {
        self.inner
            .credential
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("credential", &*self.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use folio_test_backend::{expired_credential, valid_credential};

    use super::*;
    use crate::store::MemoryStore;

    fn store_with_token(token: &str) -> Arc<dyn Store> {
        Arc::new(MemoryStore::with_entries([(CREDENTIAL_KEY, token)]))
    }

    #[test]
    fn test_rehydrate() {
        let credential = valid_credential();
        let store = store_with_token(credential.token());
        let identity = Identity::rehydrate(Arc::clone(&store));
        assert!(identity.is_signed_in());
        assert_eq!(identity.valid_credential(), Ok(credential));
    }

    #[test]
    fn test_rehydrate_discards_expired() {
        let store = store_with_token(expired_credential().token());
        let identity = Identity::rehydrate(Arc::clone(&store));
        assert!(!identity.is_signed_in());
        assert_eq!(store.get(CREDENTIAL_KEY), None);

        // Not even a JWT.
        let store = store_with_token("garbage");
        let identity = Identity::rehydrate(Arc::clone(&store));
        assert_eq!(identity.valid_credential(), Err(SignInRequired));
        assert_eq!(store.get(CREDENTIAL_KEY), None);
    }

    #[test]
    fn test_sign_in_and_out() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let identity = Identity::rehydrate(Arc::clone(&store));
        assert!(!identity.is_signed_in());

        assert_eq!(identity.sign_in(expired_credential()), Err(SignInRequired));
        assert_eq!(store.get(CREDENTIAL_KEY), None);

        let credential = valid_credential();
        identity.sign_in(credential.clone()).unwrap();
        assert_eq!(store.get(CREDENTIAL_KEY).as_deref(), Some(credential.token()));
        assert!(identity.clone().is_signed_in());

        identity.sign_out();
        assert!(!identity.is_signed_in());
        assert_eq!(store.get(CREDENTIAL_KEY), None);
        assert_eq!(SignInRequired.to_string(), SIGN_IN_REQUIRED);
    }
}
