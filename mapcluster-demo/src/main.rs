use std::sync::Arc;
use std::time::{Duration, Instant};

use mapcluster::prelude::*;
use rand::Rng;

/// A randomly placed point of interest
struct Poi {
    position: LatLng,
    name: String,
}

impl ClusterItem for Poi {
    fn position(&self) -> LatLng {
        self.position
    }

    fn title(&self) -> Option<&str> {
        Some(self.name.as_str())
    }
}

/// Scatters `count` items around a few city centres
fn generate_items(count: usize) -> Vec<Arc<Poi>> {
    const CENTRES: [(f64, f64); 4] = [
        (37.7749, -122.4194),
        (51.5074, -0.1278),
        (35.6762, 139.6503),
        (-33.8688, 151.2093),
    ];

    let mut rng = rand::rng();
    (0..count)
        .map(|i| {
            let (lat, lng) = CENTRES[i % CENTRES.len()];
            Arc::new(Poi {
                position: LatLng::new(
                    lat + rng.random_range(-0.5..0.5),
                    lng + rng.random_range(-0.5..0.5),
                ),
                name: format!("poi-{i}"),
            })
        })
        .collect()
}

fn load_config() -> Result<ClusterConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path).map_err(|e| {
                ClusterError::InvalidConfig(format!("cannot read {}: {}", path, e))
            })?;
            ClusterConfig::from_json(&json)
        }
        None => Ok(ClusterProfile::Responsive.resolve()),
    }
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = load_config()?;
    log::info!("using configuration:\n{}", config.to_json()?);

    let mut algorithm = AlgorithmBuilder::from_config(config).build::<Poi>()?;
    algorithm.add_items(generate_items(20_000));

    for zoom in 0..=16 {
        let started = Instant::now();
        let clusters = algorithm.clusters(f64::from(zoom))?;
        let largest = clusters.iter().map(|cluster| cluster.size()).max().unwrap_or(0);
        println!(
            "zoom {:>2}: {:>6} clusters, largest {:>5}, {:?}",
            zoom,
            clusters.len(),
            largest,
            started.elapsed()
        );

        // Give the background pre-cache a chance to fill the next level
        std::thread::sleep(Duration::from_millis(50));
    }

    Ok(())
}
