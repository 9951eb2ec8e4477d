use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE},
    Method,
};
use serde::Serialize;

use crate::{HttpClientError, Result};

pub const MIME_TYPE_JSON: &str = "application/json";
pub const MIME_TYPE_BINARY: &str = "application/octet-stream";

/// Supplies the body bytes and content type of a request.
#[derive(Debug)]
pub struct BodyProvider(BodySource);

#[derive(Debug)]
enum BodySource {
    None,
    Json(std::result::Result<Vec<u8>, serde_json::Error>),
    Custom { data: Vec<u8>, content_type: String },
}

/// Request without body data.
pub fn no_body() -> BodyProvider {
    BodyProvider(BodySource::None)
}

/// JSON-encoded body with `application/json` content type.
///
/// Serialization errors surface when the request is built.
pub fn json_body<T: Serialize + ?Sized>(object: &T) -> BodyProvider {
    BodyProvider(BodySource::Json(serde_json::to_vec(object)))
}

/// Raw bytes with `application/octet-stream` content type.
pub fn binary_body(data: impl Into<Vec<u8>>) -> BodyProvider {
    custom_body(data, MIME_TYPE_BINARY)
}

/// Raw bytes with a caller-chosen content type.
pub fn custom_body(data: impl Into<Vec<u8>>, content_type: impl Into<String>) -> BodyProvider {
    BodyProvider(BodySource::Custom {
        data: data.into(),
        content_type: content_type.into(),
    })
}

impl BodyProvider {
    fn resolve(self) -> Result<Option<RequestBody>> {
        match self.0 {
            BodySource::None => Ok(None),
            BodySource::Json(data) => Ok(Some(RequestBody {
                data: data.map_err(HttpClientError::Body)?,
                content_type: MIME_TYPE_JSON.to_owned(),
            })),
            BodySource::Custom { data, content_type } => {
                Ok(Some(RequestBody { data, content_type }))
            }
        }
    }
}

/// Replayable request body.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RequestBody {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Fully formed HTTP request handed to [`HttpClient::execute`](crate::HttpClient::execute).
///
/// The body is held in memory so every attempt sends identical bytes.
#[derive(Clone, Debug)]
pub struct Request {
    method: Method,
    url: String,
    headers: HeaderMap,
    body: Option<RequestBody>,
}

impl Request {
    /// Creates a request with the given method and body.
    pub fn new(method: Method, url: impl Into<String>, body: BodyProvider) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(HttpClientError::MissingUri);
        }

        let body = body.resolve()?;
        let mut headers = HeaderMap::new();
        if let Some(body) = &body {
            if !body.content_type.is_empty() {
                let value = HeaderValue::from_str(&body.content_type).map_err(|err| {
                    HttpClientError::Config(format!(
                        "invalid content type '{}': {err}",
                        body.content_type
                    ))
                })?;
                headers.insert(CONTENT_TYPE, value);
            }
        }

        Ok(Self {
            method,
            url,
            headers,
            body,
        })
    }

    pub fn get(url: impl Into<String>) -> Result<Self> {
        Self::new(Method::GET, url, no_body())
    }

    pub fn delete(url: impl Into<String>) -> Result<Self> {
        Self::new(Method::DELETE, url, no_body())
    }

    pub fn post(url: impl Into<String>, body: BodyProvider) -> Result<Self> {
        Self::new(Method::POST, url, body)
    }

    pub fn put(url: impl Into<String>, body: BodyProvider) -> Result<Self> {
        Self::new(Method::PUT, url, body)
    }

    pub fn patch(url: impl Into<String>, body: BodyProvider) -> Result<Self> {
        Self::new(Method::PATCH, url, body)
    }

    /// Adds a header, replacing any existing value with the same name.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    /// Builds a fresh transport request for one attempt.
    pub(crate) fn to_builder(&self, http: &reqwest::Client) -> reqwest::RequestBuilder {
        let builder = http
            .request(self.method.clone(), &self.url)
            .headers(self.headers.clone());
        match &self.body {
            Some(body) => builder.body(body.data.clone()),
            None => builder,
        }
    }
}

#[cfg(test)]
mod tests {
    use reqwest::{
        header::{HeaderValue, ACCEPT, CONTENT_TYPE},
        Method,
    };
    use serde::Serialize;

    use super::{binary_body, custom_body, json_body, no_body, Request};
    use crate::HttpClientError;

    #[derive(Serialize)]
    struct Item {
        name: &'static str,
        count: u32,
    }

    #[test]
    fn empty_url_is_rejected() {
        let err = Request::get("").expect_err("empty url must fail");
        assert!(matches!(err, HttpClientError::MissingUri));
    }

    #[test]
    fn get_has_no_body_or_content_type() {
        let request = Request::get("http://localhost/test").expect("request must build");
        assert_eq!(request.method(), &Method::GET);
        assert!(request.body().is_none());
        assert!(request.headers().get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn json_body_sets_content_type() {
        let request = Request::post(
            "http://localhost/test",
            json_body(&Item {
                name: "foo",
                count: 10,
            }),
        )
        .expect("request must build");

        let body = request.body().expect("body must be present");
        assert_eq!(body.data, br#"{"name":"foo","count":10}"#.to_vec());
        assert_eq!(
            request.headers().get(CONTENT_TYPE),
            Some(&HeaderValue::from_static("application/json"))
        );
    }

    #[test]
    fn binary_and_custom_bodies_keep_bytes() {
        let request = Request::put("http://localhost/test", binary_body([1u8, 2, 3]))
            .expect("request must build");
        assert_eq!(request.body().map(|b| b.data.clone()), Some(vec![1, 2, 3]));
        assert_eq!(
            request.headers().get(CONTENT_TYPE),
            Some(&HeaderValue::from_static("application/octet-stream"))
        );

        let request = Request::patch("http://localhost/test", custom_body("a,b", "text/csv"))
            .expect("request must build");
        assert_eq!(
            request.body().map(|b| b.content_type.as_str()),
            Some("text/csv")
        );
    }

    #[test]
    fn post_without_body_is_allowed() {
        let request =
            Request::post("http://localhost/test", no_body()).expect("request must build");
        assert!(request.body().is_none());
    }

    #[test]
    fn with_header_adds_header() {
        let request = Request::get("http://localhost/test")
            .expect("request must build")
            .with_header(ACCEPT, HeaderValue::from_static("text/plain"));
        assert_eq!(
            request.headers().get(ACCEPT),
            Some(&HeaderValue::from_static("text/plain"))
        );
    }
}
