//! Static files compiled into the binary and served verbatim under `/static/`.

use mime_guess::Mime;

const FILES: &[(&str, &[u8])] = &[
    ("css/main.css", include_bytes!("../ui/static/css/main.css")),
    ("js/main.js", include_bytes!("../ui/static/js/main.js")),
    ("img/favicon.svg", include_bytes!("../ui/static/img/favicon.svg")),
];

#[derive(Debug, Clone)]
pub struct Asset {
    pub path: &'static str,
    pub content_type: Mime,
    pub body: &'static [u8],
}

pub fn lookup(path: &str) -> Option<Asset> {
    FILES
        .iter()
        .find(|(name, _)| *name == path)
        .map(|&(name, body)| Asset {
            path: name,
            content_type: content_type_for(name),
            body,
        })
}

pub fn content_type_for(path: &str) -> Mime {
    mime_guess::from_path(path).first_or_octet_stream()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mime_guess::mime;

    #[test]
    fn test_lookup_known_file() {
        let asset = lookup("css/main.css").unwrap();
        assert_eq!(asset.content_type, mime::TEXT_CSS);
        assert!(!asset.body.is_empty());
    }

    #[test]
    fn test_lookup_is_exact() {
        assert!(lookup("css/../css/main.css").is_none());
        assert!(lookup("/css/main.css").is_none());
        assert!(lookup("css/").is_none());
    }

    #[test]
    fn test_content_type_fallback() {
        assert_eq!(content_type_for("img/logo.PNG"), mime::IMAGE_PNG);
        assert_eq!(content_type_for("img/favicon.svg"), mime::IMAGE_SVG);
        assert_eq!(content_type_for("README"), mime::APPLICATION_OCTET_STREAM);
    }
}
