//! Recording manager used by unit tests.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures_util::future::{BoxFuture, FutureExt};

use crate::transport::{
    ErrorKind, HttpManager, ManagerFactory, OutboundRequest, ProxyDescriptor, TransportError,
    TransportReply,
};

pub type Responder = dyn Fn(&OutboundRequest) -> BoxFuture<'static, TransportReply> + Send + Sync;

/// Shared record of everything the mock managers saw.
#[derive(Default)]
pub struct Recorder {
    pub requests: Mutex<Vec<(Option<String>, OutboundRequest)>>,
    pub cache_clears: AtomicUsize,
    pub created: Mutex<Vec<Option<String>>>,
}

impl Recorder {
    pub fn requests(&self) -> Vec<(Option<String>, OutboundRequest)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<Option<String>> {
        self.created.lock().unwrap().clone()
    }

    pub fn cache_clears(&self) -> usize {
        self.cache_clears.load(Ordering::SeqCst)
    }
}

pub struct MockFactory {
    pub recorder: Arc<Recorder>,
    responder: Arc<Responder>,
    fail_builds: AtomicBool,
    panic_on_clear: Arc<AtomicBool>,
}

impl MockFactory {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&OutboundRequest) -> BoxFuture<'static, TransportReply> + Send + Sync + 'static,
    {
        Arc::new(Self {
            recorder: Arc::new(Recorder::default()),
            responder: Arc::new(responder),
            fail_builds: AtomicBool::new(false),
            panic_on_clear: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Every request answers 200 with the given body.
    pub fn replying(body: &'static str) -> Arc<Self> {
        Self::new(move |_| async move { TransportReply::ok(200, Bytes::from_static(body.as_bytes())) }.boxed())
    }

    pub fn fail_builds(&self, fail: bool) {
        self.fail_builds.store(fail, Ordering::SeqCst);
    }

    /// Make every manager's `clear_connection_cache` panic.
    pub fn panic_on_clear(&self, panic: bool) {
        self.panic_on_clear.store(panic, Ordering::SeqCst);
    }
}

impl ManagerFactory for MockFactory {
    fn create(&self, proxy: Option<&ProxyDescriptor>) -> Result<Arc<dyn HttpManager>, TransportError> {
        if self.fail_builds.load(Ordering::SeqCst) {
            return Err(TransportError::new(ErrorKind::Unavailable, "mock build failure"));
        }
        let endpoint = proxy.map(|p| p.endpoint());
        self.recorder.created.lock().unwrap().push(endpoint.clone());
        Ok(Arc::new(MockManager {
            endpoint,
            recorder: self.recorder.clone(),
            responder: self.responder.clone(),
            panic_on_clear: self.panic_on_clear.clone(),
        }))
    }
}

pub struct MockManager {
    endpoint: Option<String>,
    recorder: Arc<Recorder>,
    responder: Arc<Responder>,
    panic_on_clear: Arc<AtomicBool>,
}

impl fmt::Debug for MockManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockManager").field("endpoint", &self.endpoint).finish()
    }
}

impl HttpManager for MockManager {
    fn execute(&self, request: OutboundRequest) -> BoxFuture<'static, TransportReply> {
        self.recorder
            .requests
            .lock()
            .unwrap()
            .push((self.endpoint.clone(), request.clone()));
        (self.responder)(&request)
    }

    fn clear_connection_cache(&self) {
        if self.panic_on_clear.load(Ordering::SeqCst) {
            panic!("mock cache reset failure");
        }
        self.recorder.cache_clears.fetch_add(1, Ordering::SeqCst);
    }
}
