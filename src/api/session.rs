use std::fs;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};
use tracing::warn;

#[derive(Debug, Default, Clone)]
struct Credentials {
    token: Option<String>,
    /// `refresh_token=<value>` pair from the server's cookie
    refresh_cookie: Option<String>,
}

/// Credentials shared by every request of one client: the bearer access
/// token and the refresh cookie `/auth/refresh` expects.
///
/// With a token file both survive process restarts (token on the first
/// line, cookie on the second); file errors are logged and otherwise
/// ignored, the in-memory copy stays authoritative.
#[derive(Debug, Default)]
pub struct SessionStore {
    creds: RwLock<Credentials>,
    path: Option<PathBuf>,
}

impl SessionStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Backed by `path`, picking up credentials left by a previous run
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let content = fs::read_to_string(&path).unwrap_or_default();
        let mut lines = content
            .lines()
            .map(|l| l.trim().to_string())
            .map(|l| (!l.is_empty()).then_some(l));
        let token = lines.next().flatten();
        let refresh_cookie = lines.next().flatten();
        Self {
            creds: RwLock::new(Credentials {
                token,
                refresh_cookie,
            }),
            path: Some(path),
        }
    }

    fn read(&self) -> Credentials {
        self.creds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update(&self, f: impl FnOnce(&mut Credentials)) {
        let snapshot = {
            let mut creds = self.creds.write().unwrap_or_else(PoisonError::into_inner);
            f(&mut creds);
            creds.clone()
        };
        self.persist(&snapshot);
    }

    fn persist(&self, creds: &Credentials) {
        let Some(path) = &self.path else {
            return;
        };
        let result = match (&creds.token, &creds.refresh_cookie) {
            (None, None) if !path.exists() => Ok(()),
            (None, None) => fs::remove_file(path),
            (token, cookie) => fs::write(
                path,
                format!(
                    "{}\n{}\n",
                    token.as_deref().unwrap_or_default(),
                    cookie.as_deref().unwrap_or_default()
                ),
            ),
        };
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "[session] failed to persist credentials");
        }
    }

    pub fn token(&self) -> Option<String> {
        self.read().token
    }

    pub fn is_authenticated(&self) -> bool {
        self.creds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .token
            .is_some()
    }

    pub fn set(&self, token: impl Into<String>) {
        let token = token.into();
        self.update(|c| c.token = Some(token));
    }

    pub fn refresh_cookie(&self) -> Option<String> {
        self.read().refresh_cookie
    }

    pub fn set_refresh_cookie(&self, cookie: impl Into<String>) {
        let cookie = cookie.into();
        self.update(|c| c.refresh_cookie = Some(cookie));
    }

    /// Drops the token and the refresh cookie
    pub fn clear(&self) {
        self.update(|c| *c = Credentials::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_lifecycle() {
        let store = SessionStore::in_memory();
        assert!(!store.is_authenticated());

        store.set("abc");
        assert_eq!(store.token().as_deref(), Some("abc"));

        store.clear();
        assert_eq!(store.token(), None);
    }

    #[test]
    fn test_token_file_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");

        let store = SessionStore::with_file(&path);
        assert!(!store.is_authenticated());
        store.set("persisted");

        let reloaded = SessionStore::with_file(&path);
        assert_eq!(reloaded.token().as_deref(), Some("persisted"));

        reloaded.clear();
        assert!(!path.exists());
        assert!(!SessionStore::with_file(&path).is_authenticated());
    }

    #[test]
    fn test_refresh_cookie_persisted_with_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");

        let store = SessionStore::with_file(&path);
        store.set("t1");
        store.set_refresh_cookie("refresh_token=r1");
        store.set("t2");

        let reloaded = SessionStore::with_file(&path);
        assert_eq!(reloaded.token().as_deref(), Some("t2"));
        assert_eq!(reloaded.refresh_cookie().as_deref(), Some("refresh_token=r1"));

        reloaded.clear();
        assert_eq!(reloaded.refresh_cookie(), None);
        assert!(!path.exists());
    }
}
