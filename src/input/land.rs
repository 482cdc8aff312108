//! Coastline polygon loader
//!
//! ```json
//! { "polygons": [ [[172.6, -40.5], [174.4, -41.3], [173.0, -42.0]] ] }
//! ```
//!
//! Vertices are `[lon, lat]` in -180..180.

use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};

use super::InputError;
use crate::geometry::LandMask;

/// Load a land mask file. Degenerate polygons (< 3 vertices) are dropped.
pub fn load_land_mask(path: &Path) -> Result<LandMask, InputError> {
    let file = std::fs::File::open(path).map_err(|e| InputError::io(path, e))?;
    let mut mask: LandMask = serde_json::from_reader(BufReader::new(file))?;

    let before = mask.polygons.len();
    mask.polygons.retain(|p| p.vertices.len() >= 3);
    if mask.polygons.len() < before {
        warn!(
            path = %path.display(),
            dropped = before - mask.polygons.len(),
            "Dropped degenerate land polygons"
        );
    }

    info!(path = %path.display(), polygons = mask.polygons.len(), "Loaded land mask");
    Ok(mask)
}
