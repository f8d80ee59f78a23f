#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use bytes::Bytes;
use futures::channel::oneshot;
use futures::executor::LocalPool;
use futures::FutureExt;
use glam::DVec3;

use vector_tile_content::{
    BatchedPrimitive, BoundingSphere, Color, ColorSelection, ContentOptions, ContentOwner, ContentServices,
    FetchError, FetchFuture, FrameState, Label, PrimitiveDescriptor, PrimitiveFactory, Request, RequestScheduler,
    TileContent,
};

pub const FILL: Color = Color::new(0.25, 0.5, 0.75, 0.5);

pub struct TestTile {
    pub distance: Cell<f64>,
    pub sphere: Cell<BoundingSphere>,
    pub server: String,
}

impl TestTile {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            distance: Cell::new(250.0),
            sphere: Cell::new(BoundingSphere::new(DVec3::new(1.0, 2.0, 3.0), 40.0)),
            server: "tiles.example.com:443".into(),
        })
    }
}

impl ContentOwner for TestTile {
    fn distance_to_camera(&self) -> f64 {
        self.distance.get()
    }

    fn content_bounding_sphere(&self) -> BoundingSphere {
        self.sphere.get()
    }

    fn request_server(&self) -> &str {
        &self.server
    }
}

/// (primitive id, frame number) per update call.
pub type UpdateLog = Rc<RefCell<Vec<(usize, u64)>>>;

pub struct RecordingPrimitive {
    id: usize,
    updates: UpdateLog,
    live: Rc<Cell<usize>>,
    frames: u32,
}

impl BatchedPrimitive for RecordingPrimitive {
    fn update(&mut self, frame: &FrameState) {
        self.frames += 1;
        self.updates.borrow_mut().push((self.id, frame.frame_number));
    }

    fn is_ready(&self) -> bool {
        self.frames > 0
    }
}

impl Drop for RecordingPrimitive {
    fn drop(&mut self) {
        self.live.set(self.live.get() - 1);
    }
}

#[derive(Default)]
pub struct RecordingFactory {
    pub descriptors: RefCell<Vec<PrimitiveDescriptor>>,
    pub labels: RefCell<Vec<Vec<Label>>>,
    pub updates: UpdateLog,
    /// Primitives created and not yet dropped.
    pub live: Rc<Cell<usize>>,
    next_id: Cell<usize>,
}

impl RecordingFactory {
    fn make(&self) -> Box<dyn BatchedPrimitive> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.live.set(self.live.get() + 1);

        Box::new(RecordingPrimitive {
            id,
            updates: Rc::clone(&self.updates),
            live: Rc::clone(&self.live),
            frames: 0,
        })
    }

    pub fn created(&self) -> usize {
        self.next_id.get()
    }
}

impl PrimitiveFactory for RecordingFactory {
    fn create(&self, descriptor: PrimitiveDescriptor) -> Box<dyn BatchedPrimitive> {
        self.descriptors.borrow_mut().push(descriptor);
        self.make()
    }

    fn create_labels(&self, labels: Vec<Label>) -> Box<dyn BatchedPrimitive> {
        self.labels.borrow_mut().push(labels);
        self.make()
    }
}

/// Scheduler whose fetches are settled by hand.
#[derive(Default)]
pub struct ManualScheduler {
    pub admit: bool,
    pub requests: Vec<Request>,
    pub pending: Vec<oneshot::Sender<Result<Bytes, FetchError>>>,
}

impl ManualScheduler {
    pub fn admitting() -> Self {
        Self {
            admit: true,
            ..Default::default()
        }
    }

    pub fn respond(&mut self, index: usize, body: &[u8]) {
        let tx = std::mem::replace(&mut self.pending[index], oneshot::channel().0);
        let _ = tx.send(Ok(Bytes::copy_from_slice(body)));
    }

    pub fn reject(&mut self, index: usize, err: FetchError) {
        let tx = std::mem::replace(&mut self.pending[index], oneshot::channel().0);
        let _ = tx.send(Err(err));
    }
}

impl RequestScheduler for ManualScheduler {
    fn schedule(&mut self, request: Request) -> Option<FetchFuture> {
        if !self.admit {
            return None;
        }

        let (tx, rx) = oneshot::channel();
        let url = request.url.clone();
        self.requests.push(request);
        self.pending.push(tx);

        Some(
            rx.map(move |settled| settled.unwrap_or(Err(FetchError::Canceled { url })))
                .boxed_local(),
        )
    }
}

pub struct Harness {
    pub pool: LocalPool,
    pub tile: Rc<TestTile>,
    pub factory: Rc<RecordingFactory>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            pool: LocalPool::new(),
            tile: TestTile::new(),
            factory: Rc::new(RecordingFactory::default()),
        }
    }

    pub fn options() -> ContentOptions {
        ContentOptions {
            color: ColorSelection::Fixed { color: FILL },
            ..Default::default()
        }
    }

    pub fn content(&self, options: ContentOptions) -> TileContent {
        let services = ContentServices {
            primitives: self.factory.clone(),
            spawner: Rc::new(self.pool.spawner()),
        };

        TileContent::new(&self.tile, "https://tiles.example.com/12/2200/1343.vctr", options, services)
    }

    pub fn run(&mut self) {
        self.pool.run_until_stalled();
    }
}

pub fn frame(n: u64) -> FrameState {
    FrameState::new(n, n as f64 / 60.0, DVec3::ZERO)
}
