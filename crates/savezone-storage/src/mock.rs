//! Scripted HTTP transport for testing adapters without a network.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use savezone_core::error::Result;

use crate::http::{HttpBody, HttpRequest, HttpResponse, HttpTransport, Method};

struct Route {
    method: Method,
    fragment: String,
    responses: VecDeque<HttpResponse>,
}

/// Replays canned responses and records every request it receives.
///
/// A request is answered by the route with the same method whose URL
/// fragment is the longest substring of the request URL (query included).
/// Responses queued on one route are served in order; the last one repeats.
/// Unrouted requests get a `404`.
///
/// ```
/// use savezone_storage::http::{HttpResponse, Method};
/// use savezone_storage::mock::MockTransport;
///
/// let transport = MockTransport::new()
///     .route(Method::PUT, "/resources?path=", HttpResponse::empty(201))
///     .route(Method::PUT, "/resources?path=", HttpResponse::empty(409));
/// assert_eq!(transport.requests().len(), 0);
/// ```
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `response` for requests matching `method` and `fragment`.
    pub fn route(self, method: Method, fragment: &str, response: HttpResponse) -> Self {
        {
            let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
            match routes
                .iter_mut()
                .find(|r| r.method == method && r.fragment == fragment)
            {
                Some(route) => route.responses.push_back(response),
                None => routes.push(Route {
                    method,
                    fragment: fragment.to_string(),
                    responses: VecDeque::from([response]),
                }),
            }
        }
        self
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of requests with `method` whose URL contains `fragment`.
    pub fn count(&self, method: &Method, fragment: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| &r.method == method && r.display_url().contains(fragment))
            .count()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn execute(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        // File payloads are read now; the file may be gone once the caller returns.
        if let Some(HttpBody::File { path, .. }) = &request.body {
            request.body = Some(HttpBody::Bytes(std::fs::read(path)?));
        }
        let url = request.display_url();
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
        let route = routes
            .iter_mut()
            .filter(|r| r.method == request.method && url.contains(&r.fragment))
            .max_by_key(|r| r.fragment.len());

        Ok(match route {
            Some(route) if route.responses.len() > 1 => route
                .responses
                .pop_front()
                .unwrap_or_else(|| HttpResponse::empty(500)),
            Some(route) => route
                .responses
                .front()
                .cloned()
                .unwrap_or_else(|| HttpResponse::empty(500)),
            None => HttpResponse::new(404, format!("no route for {} {url}", request.method)),
        })
    }
}
