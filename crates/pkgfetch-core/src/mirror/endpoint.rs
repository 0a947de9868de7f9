//! A repository endpoint (origin or mirror).

use std::fmt;
use std::path::PathBuf;
use url::Url;

/// Base URL of a repository plus optional client certificate.
///
/// The base path always ends in `/` so relative request paths join under it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mirror {
    url: Url,
    ssl_cert: Option<PathBuf>,
    ssl_key: Option<PathBuf>,
}

impl Mirror {
    pub fn parse(s: &str) -> Result<Self, url::ParseError> {
        let mut url = Url::parse(s.trim())?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(Self {
            url,
            ssl_cert: None,
            ssl_key: None,
        })
    }

    pub fn with_client_cert(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.ssl_cert = Some(cert.into());
        self.ssl_key = Some(key.into());
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn ssl_cert(&self) -> Option<&PathBuf> {
        self.ssl_cert.as_ref()
    }

    pub fn ssl_key(&self) -> Option<&PathBuf> {
        self.ssl_key.as_ref()
    }

    /// Endpoint for batched file retrieval (protocol version 0).
    pub fn filelist_url(&self) -> Result<Url, url::ParseError> {
        self.url.join("filelist/0/")
    }

    /// Stable key for statistics and persistence.
    pub fn key(&self) -> &str {
        self.url.as_str()
    }
}

impl fmt::Display for Mirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_adds_trailing_slash() {
        let m = Mirror::parse("https://pkg.example.com/solaris/release").unwrap();
        assert_eq!(m.url().as_str(), "https://pkg.example.com/solaris/release/");
        assert_eq!(
            m.filelist_url().unwrap().as_str(),
            "https://pkg.example.com/solaris/release/filelist/0/"
        );
    }

    #[test]
    fn filelist_url_at_host_root() {
        let m = Mirror::parse("http://127.0.0.1:8080").unwrap();
        assert_eq!(
            m.filelist_url().unwrap().as_str(),
            "http://127.0.0.1:8080/filelist/0/"
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Mirror::parse("not a url").is_err());
    }
}
