//! The per-tile content state machine.
//!
//! ```text
//! Unloaded --request()--> Loading --bytes--> Processing --submitted--> Ready
//!                            |
//!                            +--fetch/parse error or destroyed--> Failed
//! ```
//!
//! The fetch continuation runs on the renderer's local executor and only
//! holds a weak reference to the content. It checks the destroyed flag
//! before touching anything, so evicting a tile mid-flight never creates
//! primitives or reaches `Ready`.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use futures::channel::oneshot;
use futures::future::{FutureExt, LocalBoxFuture, Shared};
use futures::task::{LocalSpawn, LocalSpawnExt};
use glam::DVec3;

use crate::color::Color;
use crate::config::ContentOptions;
use crate::error::{ContentError, FetchError};
use crate::instances::build_instances;
use crate::primitive::{Appearance, BatchedPrimitive, Label, PrimitiveDescriptor, PrimitiveFactory};
use crate::request::{FetchKind, Request, RequestKind, RequestScheduler};
use crate::types::{BoundingSphere, ContentOwner, FrameState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentState {
    Unloaded,
    Loading,
    Processing,
    Ready,
    Failed,
}

impl ContentState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ContentState::Ready | ContentState::Failed)
    }

    /// Forward-only: each step of the happy path, or any non-terminal state to `Failed`.
    fn can_advance_to(self, next: ContentState) -> bool {
        use ContentState::*;
        matches!(
            (self, next),
            (Unloaded, Loading)
                | (Unloaded, Processing)
                | (Loading, Processing)
                | (Processing, Ready)
                | (Unloaded | Loading | Processing, Failed)
        )
    }
}

/// Outcome of [`TileContent::request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    /// Scheduler accepted; the content is `Loading`.
    Admitted,
    /// Scheduler declined for now; still `Unloaded`, ask again next frame.
    Throttled,
    /// A request was already issued (or the content was initialized directly).
    AlreadyIssued,
    /// The owning tile is gone.
    OwnerReleased,
    Destroyed,
    /// The fetch was admitted but its continuation could not be spawned; the
    /// content is `Failed`.
    SpawnFailed,
}

/// Per-feature handle. Vector tiles carry no feature table yet, so none is
/// ever produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileFeature {
    pub batch_id: u32,
}

type ContentResult = Result<(), ContentError>;

/// Single-resolution readiness future; clone freely.
pub type ReadyFuture = Shared<LocalBoxFuture<'static, ContentResult>>;

/// A future settled exactly once from the inside. Dropping the sender
/// unsettled reads as [`ContentError::Destroyed`].
struct Deferred {
    tx: Option<oneshot::Sender<ContentResult>>,
    future: ReadyFuture,
}

impl Deferred {
    fn new() -> Self {
        let (tx, rx) = oneshot::channel();
        let future = rx
            .map(|settled| settled.unwrap_or(Err(ContentError::Destroyed)))
            .boxed_local()
            .shared();

        Self { tx: Some(tx), future }
    }

    fn settle(&mut self, result: ContentResult) {
        if let Some(tx) = self.tx.take() {
            // The receiver lives in `future`, which we own.
            let _ = tx.send(result);
        }
    }
}

/// External collaborators a content needs besides its owner.
#[derive(Clone)]
pub struct ContentServices {
    pub primitives: Rc<dyn PrimitiveFactory>,
    /// Executor the fetch continuation is spawned on.
    pub spawner: Rc<dyn LocalSpawn>,
}

struct ContentInner {
    url: String,
    state: ContentState,
    destroyed: bool,
    owner: Weak<dyn ContentOwner>,
    options: ContentOptions,
    factory: Rc<dyn PrimitiveFactory>,
    primitives: Vec<Box<dyn BatchedPrimitive>>,
    labels: Option<Box<dyn BatchedPrimitive>>,
    ready_to_process: Deferred,
    ready: Deferred,
}

impl ContentInner {
    fn transition(&mut self, next: ContentState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal content transition {:?} -> {:?}",
            self.state,
            next
        );
        log::debug!("{}: {:?} -> {:?}", self.url, self.state, next);
        self.state = next;
    }

    fn fail(&mut self, err: ContentError) {
        if self.state.is_terminal() {
            return;
        }

        log::debug!("{}: failed ({})", self.url, err);
        self.transition(ContentState::Failed);
        self.ready_to_process.settle(Err(err.clone()));
        self.ready.settle(Err(err));
    }

    /// Continuation of the fetch. Runs on the executor, never re-entrantly.
    fn on_fetched(&mut self, result: Result<bytes::Bytes, FetchError>) {
        if self.destroyed {
            // Waiters were already rejected by destroy(); just stop here.
            log::debug!("{}: destroyed while loading, dropping response", self.url);
            if !self.state.is_terminal() {
                self.transition(ContentState::Failed);
            }
            return;
        }

        match result {
            Ok(bytes) => {
                // Failures are routed into the readiness futures.
                let _ = self.initialize(&bytes, 0);
            }
            Err(err) => self.fail(err.into()),
        }
    }

    fn initialize(&mut self, bytes: &[u8], byte_offset: usize) -> ContentResult {
        if self.destroyed {
            let err = ContentError::Destroyed;
            self.ready_to_process.settle(Err(err.clone()));
            self.ready.settle(Err(err.clone()));
            return Err(err);
        }

        if !matches!(self.state, ContentState::Unloaded | ContentState::Loading) {
            return Err(ContentError::InvalidState(self.state));
        }

        let stages = self.options.stages;
        let payload = match vctr::parse_payload(bytes, byte_offset, stages.framing()) {
            Ok(payload) => payload,
            Err(e) => {
                let err = ContentError::from(e);
                self.fail(err.clone());
                return Err(err);
            }
        };

        if stages.labels {
            if let Err(e) = payload.validate_labels() {
                let err = ContentError::from(e);
                self.fail(err.clone());
                return Err(err);
            }
        }

        let color = self.options.color.pick();
        let built = build_instances(&payload.polygons, color, stages.outline);
        let labels: Vec<Label> = if stages.labels {
            payload
                .labels
                .into_iter()
                .map(|l| Label {
                    position: DVec3::from_array(l.position.to_ecef()),
                    text: l.text,
                })
                .collect()
        } else {
            Vec::new()
        };

        log::debug!(
            "{}: {} polygons, heights {:?}..{:?}",
            self.url,
            built.fill.len(),
            built.heights.minimum,
            built.heights.maximum
        );

        self.transition(ContentState::Processing);
        self.ready_to_process.settle(Ok(()));

        let fill = if stages.extruded {
            PrimitiveDescriptor::Extruded {
                instances: built.fill,
                appearance: Appearance {
                    closed: true,
                    translucent: true,
                },
                asynchronous: false,
            }
        } else {
            PrimitiveDescriptor::GroundClamped {
                instances: built.fill,
                minimum_height: built.heights.minimum,
                maximum_height: built.heights.maximum,
                asynchronous: false,
                precreated: built.precreated,
            }
        };
        self.primitives.push(self.factory.create(fill));

        if stages.outline && !built.outlines.is_empty() {
            self.primitives.push(self.factory.create(PrimitiveDescriptor::Outline {
                instances: built.outlines,
                asynchronous: false,
            }));
        }

        if stages.labels {
            self.labels = Some(self.factory.create_labels(labels));
        }

        self.transition(ContentState::Ready);
        self.ready.settle(Ok(()));

        Ok(())
    }
}

/// Vector content of one streamed tile.
pub struct TileContent {
    inner: Rc<RefCell<ContentInner>>,
    spawner: Rc<dyn LocalSpawn>,
    bounding_sphere: BoundingSphere,
    ready_to_process: ReadyFuture,
    ready: ReadyFuture,
}

impl TileContent {
    pub fn new<O>(owner: &Rc<O>, url: impl Into<String>, options: ContentOptions, services: ContentServices) -> Self
    where
        O: ContentOwner + 'static,
    {
        let bounding_sphere = owner.content_bounding_sphere();
        let owner: Weak<O> = Rc::downgrade(owner);
        let owner: Weak<dyn ContentOwner> = owner;

        let ready_to_process = Deferred::new();
        let ready = Deferred::new();
        let ready_to_process_future = ready_to_process.future.clone();
        let ready_future = ready.future.clone();

        let inner = ContentInner {
            url: url.into(),
            state: ContentState::Unloaded,
            destroyed: false,
            owner,
            options,
            factory: services.primitives,
            primitives: Vec::new(),
            labels: None,
            ready_to_process,
            ready,
        };

        Self {
            inner: Rc::new(RefCell::new(inner)),
            spawner: services.spawner,
            bounding_sphere,
            ready_to_process: ready_to_process_future,
            ready: ready_future,
        }
    }

    pub fn state(&self) -> ContentState {
        self.inner.borrow().state
    }

    pub fn url(&self) -> String {
        self.inner.borrow().url.clone()
    }

    pub fn bounding_sphere(&self) -> BoundingSphere {
        self.bounding_sphere
    }

    /// Resolves when the content reaches `Ready`; rejects on failure or destruction.
    pub fn ready(&self) -> ReadyFuture {
        self.ready.clone()
    }

    /// Resolves when parsed geometry is handed to the primitives.
    pub fn ready_to_process(&self) -> ReadyFuture {
        self.ready_to_process.clone()
    }

    pub fn primitives_len(&self) -> usize {
        self.inner.borrow().primitives.len()
    }

    pub fn has_labels(&self) -> bool {
        self.inner.borrow().labels.is_some()
    }

    /// True once every owned primitive reports ready.
    pub fn primitives_ready(&self) -> bool {
        let inner = self.inner.borrow();
        inner.primitives.iter().all(|p| p.is_ready()) && inner.labels.as_ref().map_or(true, |l| l.is_ready())
    }

    pub fn features_length(&self) -> usize {
        0
    }

    pub fn feature_properties_dirty(&self) -> bool {
        false
    }

    pub fn inner_contents(&self) -> &[TileContent] {
        &[]
    }

    pub fn has_property(&self, _name: &str) -> bool {
        false
    }

    pub fn get_feature(&self, _batch_id: u32) -> Option<TileFeature> {
        None
    }

    pub fn apply_debug_settings(&mut self, _enabled: bool, _color: Color) {}

    /// Issues the single fetch for this tile.
    pub fn request(&mut self, scheduler: &mut dyn RequestScheduler) -> RequestStatus {
        let request = {
            let inner = self.inner.borrow();
            if inner.destroyed {
                return RequestStatus::Destroyed;
            }
            if inner.state != ContentState::Unloaded {
                return RequestStatus::AlreadyIssued;
            }
            let Some(owner) = inner.owner.upgrade() else {
                return RequestStatus::OwnerReleased;
            };

            Request {
                url: inner.url.clone(),
                server: owner.request_server().to_owned(),
                fetch: FetchKind::Binary,
                kind: RequestKind::Tiles3d,
                distance: owner.distance_to_camera(),
            }
        };

        let Some(fetch) = scheduler.schedule(request) else {
            return RequestStatus::Throttled;
        };

        self.inner.borrow_mut().transition(ContentState::Loading);

        let weak = Rc::downgrade(&self.inner);
        let continuation = async move {
            let result = fetch.await;
            if let Some(inner) = weak.upgrade() {
                inner.borrow_mut().on_fetched(result);
            }
        };

        if let Err(e) = self.spawner.spawn_local(continuation) {
            self.inner.borrow_mut().fail(ContentError::Spawn(e.to_string()));
            return RequestStatus::SpawnFailed;
        }

        RequestStatus::Admitted
    }

    /// Parses `bytes` from `byte_offset` and builds the primitives. Normally
    /// called by the fetch continuation; composite tiles call it directly.
    pub fn initialize(&mut self, bytes: &[u8], byte_offset: usize) -> Result<(), ContentError> {
        self.inner.borrow_mut().initialize(bytes, byte_offset)
    }

    /// Forwards the frame to every primitive, in creation order.
    pub fn update(&mut self, frame: &FrameState) {
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;

        for primitive in inner.primitives.iter_mut() {
            primitive.update(frame);
        }

        if let Some(labels) = inner.labels.as_mut() {
            labels.update(frame);
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.borrow().destroyed
    }

    /// Releases every primitive and the label collection. Pending readiness
    /// futures reject with [`ContentError::Destroyed`]. An in-flight fetch is
    /// not canceled, but its result is discarded.
    pub fn destroy(&mut self) {
        let mut inner = self.inner.borrow_mut();
        if inner.destroyed {
            return;
        }

        log::debug!("{}: destroyed in state {:?}", inner.url, inner.state);
        inner.destroyed = true;
        inner.primitives.clear();
        inner.labels = None;
        inner.ready_to_process.settle(Err(ContentError::Destroyed));
        inner.ready.settle(Err(ContentError::Destroyed));
    }
}
