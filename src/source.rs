use crate::error::{Error, Result};
use std::fmt;
use std::path::{self, PathBuf};
use url::Url;

/// What the browser should load.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderSource {
    Url(Url),
    /// Absolute path of a local file
    LocalFile(PathBuf),
}

impl RenderSource {
    pub fn resolve(arg: Option<&str>) -> Result<RenderSource> {
        let arg = arg.ok_or(Error::MissingSource)?;

        match Url::parse(arg) {
            Ok(url) if url.has_host() || url.scheme() == "file" => Ok(RenderSource::Url(url)),
            _ => {
                let path = path::absolute(arg).map_err(|_| Error::InvalidSource(arg.to_string()))?;
                Ok(RenderSource::LocalFile(path))
            }
        }
    }

    /// The URL handed to the browser.
    pub fn url(&self) -> Result<String> {
        match self {
            RenderSource::Url(url) => Ok(url.to_string()),
            RenderSource::LocalFile(path) => Url::from_file_path(path)
                .map(String::from)
                .map_err(|_| Error::InvalidSource(path.display().to_string())),
        }
    }
}

impl fmt::Display for RenderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderSource::Url(url) => write!(f, "{url}"),
            RenderSource::LocalFile(path) => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::current_dir;

    #[test]
    fn test_missing_source() {
        assert!(matches!(
            RenderSource::resolve(None),
            Err(Error::MissingSource)
        ));
    }

    #[test]
    fn test_absolute_url() {
        let source = RenderSource::resolve(Some("https://example.com")).unwrap();
        assert_eq!(
            source,
            RenderSource::Url(Url::parse("https://example.com").unwrap())
        );
        assert_eq!(source.url().unwrap(), "https://example.com/");
    }

    #[test]
    fn test_relative_path() {
        let source = RenderSource::resolve(Some("./page.html")).unwrap();

        let path = match &source {
            RenderSource::LocalFile(path) => path.clone(),
            other => panic!("expected a local file, got {:?}", other),
        };
        assert!(path.is_absolute());
        assert!(path.starts_with(current_dir().unwrap()));
        assert!(path.ends_with("page.html"));

        let url = source.url().unwrap();
        assert!(url.starts_with("file:///"));
        assert!(url.ends_with("/page.html"));
    }

    #[test]
    fn test_file_url() {
        let source = RenderSource::resolve(Some("file:///tmp/page.html")).unwrap();
        assert!(matches!(source, RenderSource::Url(_)));
        assert_eq!(source.url().unwrap(), "file:///tmp/page.html");
    }

    #[test]
    fn test_url_without_authority_is_a_path() {
        let source = RenderSource::resolve(Some("page:html")).unwrap();
        assert!(matches!(source, RenderSource::LocalFile(_)));
    }

    #[test]
    fn test_path_with_spaces() {
        let source = RenderSource::resolve(Some("/tmp/my page.html")).unwrap();
        assert_eq!(
            source,
            RenderSource::LocalFile(PathBuf::from("/tmp/my page.html"))
        );
        assert_eq!(source.url().unwrap(), "file:///tmp/my%20page.html");
    }
}
