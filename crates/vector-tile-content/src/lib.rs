//! Content lifecycle for streamed vector tiles.
//!
//! A [`TileContent`] owns one tile's vector payload from request to render:
//! it asks a [`RequestScheduler`] for the bytes, parses them with the `vctr`
//! format library, builds one geometry instance per polygon and hands the
//! batch to a [`PrimitiveFactory`]. Everything runs on a single-threaded
//! executor; the only suspension point is the fetch.

pub mod color;
pub mod config;
pub mod content;
pub mod error;
pub mod instances;
pub mod primitive;
pub mod request;
pub mod types;

// Re-export commonly used types for convenience.
pub use self::color::{Color, ColorAttribute, ColorSelection};
pub use self::config::{ConfigError, ContentOptions, PipelineStages, SchedulerLimits};
pub use self::content::{ContentServices, ContentState, ReadyFuture, RequestStatus, TileContent, TileFeature};
pub use self::error::{ContentError, ErrorKind, FetchError};
pub use self::instances::{build_instances, BuiltGeometry, HeightRange};
pub use self::primitive::{
    Appearance, BatchedPrimitive, Geometry, GeometryInstance, Label, PrimitiveDescriptor, PrimitiveFactory,
    PrimitiveKind,
};
pub use self::request::{FetchFuture, FetchKind, Request, RequestKind, RequestScheduler, ThrottledScheduler};
pub use self::types::{BoundingSphere, ContentOwner, FrameState};
