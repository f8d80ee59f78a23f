//! Headless run of one tile through [`TileContent`].

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Args;
use futures::executor::LocalPool;
use futures::FutureExt;
use std::{
    cell::RefCell,
    fmt, fs,
    path::{Path, PathBuf},
    rc::Rc,
};

use vector_tile_content::{
    BatchedPrimitive, BoundingSphere, ContentOptions, ContentOwner, ContentServices, ContentState, FetchError,
    FetchFuture, FrameState, Label, PrimitiveDescriptor, PrimitiveFactory, PrimitiveKind, Request, RequestStatus,
    SchedulerLimits, ThrottledScheduler, TileContent,
};

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    /// Tile to load, framed or bare JSON.
    pub path: PathBuf,

    /// JSON file with content options (colour selection, pipeline stages).
    #[arg(long, env = "VCTR_OPTIONS")]
    pub options: Option<PathBuf>,

    /// Require the `vctr` header instead of detecting it.
    #[arg(long, default_value_t = false)]
    pub strict: bool,
}

/// Stand-in tile for a file on disk.
struct LocalTile;

impl ContentOwner for LocalTile {
    fn distance_to_camera(&self) -> f64 {
        0.0
    }

    fn content_bounding_sphere(&self) -> BoundingSphere {
        BoundingSphere::default()
    }

    fn request_server(&self) -> &str {
        "file"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveSummary {
    pub kind: PrimitiveKind,
    pub instances: usize,
    pub minimum_height: Option<f64>,
    pub maximum_height: Option<f64>,
}

struct HeadlessPrimitive {
    updated: bool,
}

impl BatchedPrimitive for HeadlessPrimitive {
    fn update(&mut self, _frame: &FrameState) {
        self.updated = true;
    }

    fn is_ready(&self) -> bool {
        self.updated
    }
}

/// Records what would have been uploaded.
#[derive(Default)]
struct HeadlessFactory {
    primitives: RefCell<Vec<PrimitiveSummary>>,
    labels: RefCell<Vec<String>>,
}

impl PrimitiveFactory for HeadlessFactory {
    fn create(&self, descriptor: PrimitiveDescriptor) -> Box<dyn BatchedPrimitive> {
        let (minimum_height, maximum_height) = match &descriptor {
            PrimitiveDescriptor::GroundClamped {
                minimum_height,
                maximum_height,
                ..
            } => (*minimum_height, *maximum_height),
            _ => (None, None),
        };

        self.primitives.borrow_mut().push(PrimitiveSummary {
            kind: descriptor.kind(),
            instances: descriptor.instances().len(),
            minimum_height,
            maximum_height,
        });

        Box::new(HeadlessPrimitive { updated: false })
    }

    fn create_labels(&self, labels: Vec<Label>) -> Box<dyn BatchedPrimitive> {
        self.labels.borrow_mut().extend(labels.into_iter().map(|l| l.text));
        Box::new(HeadlessPrimitive { updated: false })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub url: String,
    pub state: ContentState,
    pub primitives: Vec<PrimitiveSummary>,
    pub labels: Vec<String>,
    pub error: Option<String>,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {:?}", self.url, self.state)?;

        for p in &self.primitives {
            write!(f, "  {:?}: {} instances", p.kind, p.instances)?;
            if let (Some(lo), Some(hi)) = (p.minimum_height, p.maximum_height) {
                write!(f, ", heights {lo}..{hi}")?;
            }
            writeln!(f)?;
        }

        if !self.labels.is_empty() {
            writeln!(f, "  labels: {}", self.labels.join(", "))?;
        }
        if let Some(err) = &self.error {
            writeln!(f, "  error: {err}")?;
        }

        Ok(())
    }
}

fn read_tile(request: &Request) -> FetchFuture {
    let url = request.url.clone();
    let result = fs::read(Path::new(&url)).map(Bytes::from).map_err(|e| FetchError::io(url, e));
    futures::future::ready(result).boxed_local()
}

fn load_options(args: &InspectArgs) -> Result<ContentOptions> {
    let mut options = match &args.options {
        Some(path) => ContentOptions::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => ContentOptions::default(),
    };

    if args.strict {
        options.stages.strict_framing = true;
    } else if !options.stages.strict_framing {
        let head = fs::read(&args.path).with_context(|| format!("reading {}", args.path.display()))?;
        options.stages.strict_framing = vctr::detect_framing(&head) == vctr::Framing::Strict;
    }

    Ok(options)
}

pub fn run(args: &InspectArgs) -> Result<Summary> {
    let options = load_options(args)?;
    log::debug!("inspecting {} with {:?}", args.path.display(), options);

    let mut pool = LocalPool::new();
    let tile = Rc::new(LocalTile);
    let factory = Rc::new(HeadlessFactory::default());
    let services = ContentServices {
        primitives: factory.clone(),
        spawner: Rc::new(pool.spawner()),
    };

    let url = args.path.display().to_string();
    let mut content = TileContent::new(&tile, url.clone(), options, services);
    let mut scheduler = ThrottledScheduler::new(SchedulerLimits::default(), read_tile);

    let status = content.request(&mut scheduler);
    if status != RequestStatus::Admitted {
        anyhow::bail!("request for {url} was not admitted: {status:?}");
    }

    pool.run_until_stalled();
    content.update(&FrameState::default());

    let error = match content.ready().now_or_never() {
        Some(Err(err)) => Some(err.to_string()),
        Some(Ok(())) => None,
        None => Some("content did not settle".to_owned()),
    };

    let summary = Summary {
        url,
        state: content.state(),
        primitives: factory.primitives.borrow().clone(),
        labels: factory.labels.borrow().clone(),
        error,
    };
    content.destroy();

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "polygons": [
            {"positions": [[0,0],[1,0],[1,1]], "minimumHeight": 5, "maximumHeight": 25},
            {"positions": [[0,0],[1,0],[0,1]], "maximumHeight": 40}
        ],
        "labels": [{"text": "Null Island", "position": [0, 0]}]
    }"#;

    fn args(path: PathBuf) -> InspectArgs {
        InspectArgs {
            path,
            options: None,
            strict: false,
        }
    }

    #[test]
    fn bare_json_tile_is_ground_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tile.json");
        fs::write(&path, PAYLOAD).unwrap();

        let summary = run(&args(path)).unwrap();

        assert_eq!(summary.state, ContentState::Ready);
        assert_eq!(summary.error, None);
        assert_eq!(
            summary.primitives,
            vec![PrimitiveSummary {
                kind: PrimitiveKind::GroundClamped,
                instances: 2,
                minimum_height: Some(5.0),
                maximum_height: Some(40.0),
            }]
        );
        assert!(summary.labels.is_empty());
        assert!(summary.to_string().contains("heights 5..40"));
    }

    #[test]
    fn framed_tile_is_detected_and_options_apply() {
        let dir = tempfile::tempdir().unwrap();
        let tile = dir.path().join("tile.vctr");
        fs::write(&tile, vctr::encode_framed(PAYLOAD.as_bytes()).unwrap()).unwrap();
        let options = dir.path().join("options.json");
        fs::write(&options, r#"{"stages": {"outline": true, "labels": true}}"#).unwrap();

        let summary = run(&InspectArgs {
            options: Some(options),
            ..args(tile)
        })
        .unwrap();

        assert_eq!(summary.state, ContentState::Ready);
        let kinds: Vec<_> = summary.primitives.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![PrimitiveKind::GroundClamped, PrimitiveKind::Outline]);
        assert_eq!(summary.labels, vec!["Null Island".to_owned()]);
    }

    #[test]
    fn strict_flag_rejects_bare_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tile.json");
        fs::write(&path, PAYLOAD).unwrap();

        let summary = run(&InspectArgs {
            strict: true,
            ..args(path)
        })
        .unwrap();

        assert_eq!(summary.state, ContentState::Failed);
        assert!(summary.primitives.is_empty());
        assert!(summary.error.is_some());
    }

    #[test]
    fn missing_file_fails_the_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let summary = run(&InspectArgs {
            strict: true,
            ..args(dir.path().join("absent.vctr"))
        })
        .unwrap();

        assert_eq!(summary.state, ContentState::Failed);
        assert!(summary.error.unwrap().contains("absent.vctr"));
    }
}
