use std::io::Read;
use std::time::Duration;

use crate::config::HttpConfig;
use crate::req::{HttpClient, HttpResponse};
use crate::{Error, Result};

/// [`HttpClient`] backed by a shared `ureq` agent.
///
/// [`HttpClient`]: req/trait.HttpClient.html
#[derive(Clone)]
pub struct UReq {
    agent: ureq::Agent,
}

impl UReq {
    pub fn new(config: &HttpConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build();
        UReq { agent }
    }

    fn call(&self, req: ureq::Request, body: Option<&str>) -> Result<HttpResponse> {
        trace!("{:?}", req);
        let res = match body {
            Some(body) => req.send_string(body),
            None => req.call(),
        };
        match res {
            // 4xx/5xx still carry a replay nonce and a problem document.
            Ok(res) | Err(ureq::Error::Status(_, res)) => Ok(read_response(res)),
            Err(ureq::Error::Transport(t)) => Err(Error::Transport(t.to_string())),
        }
    }
}

impl Default for UReq {
    fn default() -> Self {
        UReq::new(&HttpConfig::default())
    }
}

impl HttpClient for UReq {
    fn get(&self, url: &str) -> Result<HttpResponse> {
        self.call(self.agent.get(url), None)
    }

    fn head(&self, url: &str) -> Result<HttpResponse> {
        self.call(self.agent.head(url), None)
    }

    fn post(&self, url: &str, body: &str) -> Result<HttpResponse> {
        let req = self
            .agent
            .post(url)
            .set("content-type", "application/jose+json");
        self.call(req, Some(body))
    }
}

fn read_response(res: ureq::Response) -> HttpResponse {
    let status = res.status();
    let mut headers = vec![];
    for name in res.headers_names() {
        for value in res.all(&name) {
            headers.push((name.clone(), value.to_string()));
        }
    }
    let mut res_body = String::new();
    // letsencrypt sometimes closes the TLS abruptly causing io error
    // even though we did capture the body.
    res.into_reader().read_to_string(&mut res_body).ok();
    headers
        .into_iter()
        .fold(HttpResponse::new(status, res_body), |r, (n, v)| r.with_header(&n, v))
}
