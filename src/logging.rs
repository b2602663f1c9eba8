use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use log::{debug, info, warn};
use rocket::{
    fairing::{Fairing, Info, Kind},
    http::{Status, StatusClass},
    Data, Orbit, Request, Response, Rocket,
};

/// Sequence number of a request, used to pair up its log lines.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct RequestId(pub usize);

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl RequestId {
    /// Wraps back to zero on overflow.
    pub fn next() -> RequestId {
        static REQUEST_ID_COUNTER: AtomicUsize = AtomicUsize::new(0);
        RequestId(REQUEST_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// When Rocket handed us the request.
struct Received(Instant);

/// Logs one line per request and one per response, tagged with a
/// [`RequestId`] and the time taken to answer.
#[derive(Debug, Copy, Clone)]
pub struct LoggerFairing;

impl LoggerFairing {
    /// Log level for a response, by status class.
    fn level(status: Status) -> log::Level {
        match status.class() {
            StatusClass::ServerError => log::Level::Error,
            StatusClass::ClientError => log::Level::Warn,
            _ => log::Level::Info,
        }
    }
}

#[rocket::async_trait]
impl Fairing for LoggerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Request logger",
            kind: Kind::Liftoff | Kind::Request | Kind::Response | Kind::Shutdown,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let config = rocket.config();
        let protocol = if config.tls_enabled() { "https" } else { "http" };
        info!(
            "Accepting polls on {protocol}://{}:{}",
            config.address, config.port
        );
        debug!("{} route(s) mounted", rocket.routes().count());
    }

    async fn on_request(&self, req: &mut Request<'_>, _data: &mut Data<'_>) {
        req.local_cache(|| Received(Instant::now()));
        let id = req.local_cache(RequestId::next);
        let origin = match req.client_ip() {
            Some(ip) => ip.to_string(),
            None => "unknown origin".to_string(),
        };
        info!("{id} -> {} {} from {origin}", req.method(), req.uri());
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let id = req.local_cache(RequestId::next);
        let elapsed = req.local_cache(|| Received(Instant::now())).0.elapsed();
        let status = res.status();
        let handler = req
            .route()
            .and_then(|route| route.name.as_deref())
            .unwrap_or("no route");
        log::log!(
            Self::level(status),
            "{id} <- {status} from {handler} in {}ms",
            elapsed.as_millis()
        );
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        warn!("Shutdown requested, finishing in-flight requests...");
    }
}
