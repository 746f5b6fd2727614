use std::collections::BTreeMap;
use std::thread;
use std::time::{Duration, Instant};

use adjacency_common::{LayerResult, MeasureParams};
use crossbeam_channel::bounded;

use crate::backend::{BackendFactory, SourceError};
use crate::task::{self, TaskError};

/// The completed work for one layer, timed on the worker that ran it
pub struct LayerOutcome {
    pub layer: String,
    pub result: Result<LayerResult, TaskError>,
    pub elapsed: Duration,
}

/// Run every layer task and deliver outcomes to `on_complete` in submission
/// order.
///
/// With `worker_count <= 1` layers run strictly sequentially on the calling
/// thread. Otherwise a fixed pool of worker threads drains the layer queue;
/// each worker opens its own backend through the factory on first use, so no
/// parsed document state is shared across threads. Workers may finish out of
/// order; outcomes are buffered and released to `on_complete` strictly in
/// the order the layers were given.
///
/// A failed layer surfaces as an `Err` outcome for that layer only. An error
/// returned by `on_complete` aborts the run; in-flight workers wind down
/// once their result channel disconnects.
pub fn run_all<F, C, E>(
    factory: &F,
    layers: &[String],
    worker_count: usize,
    params: &MeasureParams,
    mut on_complete: C,
) -> Result<(), E>
where
    F: BackendFactory,
    C: FnMut(usize, LayerOutcome) -> Result<(), E>,
{
    if worker_count <= 1 {
        let backend = factory.open().map_err(|e| e.to_string());
        for (idx, layer) in layers.iter().enumerate() {
            let started = Instant::now();
            let result = match &backend {
                Ok(b) => task::run_layer(b, layer, params),
                Err(msg) => Err(TaskError::Source(SourceError::Document(msg.clone()))),
            };
            on_complete(
                idx,
                LayerOutcome {
                    layer: layer.clone(),
                    result,
                    elapsed: started.elapsed(),
                },
            )?;
        }
        return Ok(());
    }

    let worker_count = worker_count.min(layers.len()).max(1);

    thread::scope(|scope| {
        let (job_tx, job_rx) = bounded::<(usize, String)>(layers.len().max(1));
        let (res_tx, res_rx) = bounded::<(usize, LayerOutcome)>(worker_count);

        for (idx, layer) in layers.iter().enumerate() {
            // Capacity covers the whole queue; this never blocks
            let _ = job_tx.send((idx, layer.clone()));
        }
        drop(job_tx);

        for _ in 0..worker_count {
            let job_rx = job_rx.clone();
            let res_tx = res_tx.clone();
            scope.spawn(move || {
                // Opened lazily so a worker that never draws a job never
                // pays for its own parse of the annotation document
                let mut backend = None;
                for (idx, layer) in job_rx.iter() {
                    let backend = backend
                        .get_or_insert_with(|| factory.open().map_err(|e| e.to_string()));
                    let started = Instant::now();
                    let result = match backend {
                        Ok(b) => task::run_layer(b, &layer, params),
                        Err(msg) => {
                            Err(TaskError::Source(SourceError::Document(msg.clone())))
                        }
                    };
                    let outcome = LayerOutcome {
                        layer,
                        result,
                        elapsed: started.elapsed(),
                    };
                    if res_tx.send((idx, outcome)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(job_rx);
        drop(res_tx);

        // Pair each layer with its own result regardless of completion order
        let mut pending: BTreeMap<usize, LayerOutcome> = BTreeMap::new();
        let mut next = 0usize;
        for (idx, outcome) in res_rx.iter() {
            pending.insert(idx, outcome);
            while let Some(ready) = pending.remove(&next) {
                on_complete(next, ready)?;
                next += 1;
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use adjacency_common::BoundaryInfo;
    use crate::backend::{Backend, ScoringError};

    #[derive(Clone)]
    struct FakeBoundary {
        name: String,
        index: u32,
    }

    impl BoundaryInfo for FakeBoundary {
        fn name(&self) -> &str {
            &self.name
        }
        fn index(&self) -> u32 {
            self.index
        }
    }

    /// Deterministic in-memory backend: each known layer holds a fixed
    /// number of boundaries, every pair is a candidate, and the score of a
    /// pair is derived from the two indices.
    struct FakeBackend {
        layers: Vec<(String, u32)>,
    }

    impl Backend for FakeBackend {
        type Boundary = FakeBoundary;

        fn list_layers(&self) -> Vec<String> {
            self.layers.iter().map(|(name, _)| name.clone()).collect()
        }

        fn boundaries_in_layer(
            &self,
            layer: &str,
            _area_threshold: f64,
            _bbox_scale: f64,
        ) -> Result<Vec<FakeBoundary>, SourceError> {
            let (_, count) = self
                .layers
                .iter()
                .find(|(name, _)| name == layer)
                .ok_or_else(|| SourceError::UnknownLayer(layer.to_string()))?;
            Ok((0..*count)
                .map(|index| FakeBoundary {
                    name: format!("C{index}"),
                    index,
                })
                .collect())
        }

        fn candidate_pairs(
            &self,
            boundaries: &[FakeBoundary],
        ) -> Vec<(FakeBoundary, FakeBoundary)> {
            let mut pairs = Vec::new();
            for i in 0..boundaries.len() {
                for j in (i + 1)..boundaries.len() {
                    pairs.push((boundaries[i].clone(), boundaries[j].clone()));
                }
            }
            pairs
        }

        fn score(
            &self,
            pairs: &[(FakeBoundary, FakeBoundary)],
            pixel_radius: u32,
        ) -> Result<Vec<(FakeBoundary, FakeBoundary, f64)>, ScoringError> {
            Ok(pairs
                .iter()
                .map(|(a, b)| {
                    let value = f64::from(a.index + b.index + pixel_radius);
                    (a.clone(), b.clone(), value)
                })
                .collect())
        }
    }

    struct FakeFactory {
        layers: Vec<(String, u32)>,
    }

    impl BackendFactory for FakeFactory {
        type Backend = FakeBackend;

        fn open(&self) -> Result<FakeBackend, SourceError> {
            Ok(FakeBackend {
                layers: self.layers.clone(),
            })
        }
    }

    fn fixture() -> (FakeFactory, Vec<String>) {
        let layers = vec![
            ("L1".to_string(), 3),
            ("L2".to_string(), 0),
            ("L3".to_string(), 2),
            ("L4".to_string(), 4),
        ];
        let names = layers.iter().map(|(n, _)| n.clone()).collect();
        (FakeFactory { layers }, names)
    }

    fn collect(worker_count: usize) -> Vec<(usize, String, LayerResult)> {
        let (factory, names) = fixture();
        let mut seen = Vec::new();
        run_all::<_, _, ()>(
            &factory,
            &names,
            worker_count,
            &MeasureParams::default(),
            |idx, outcome| {
                seen.push((idx, outcome.layer, outcome.result.unwrap()));
                Ok(())
            },
        )
        .unwrap();
        seen
    }

    #[test]
    fn sequential_delivers_in_submission_order() {
        let seen = collect(1);
        let order: Vec<&str> = seen.iter().map(|(_, layer, _)| layer.as_str()).collect();
        assert_eq!(order, ["L1", "L2", "L3", "L4"]);
        assert_eq!(seen[0].2.len(), 3); // 3 boundaries -> 3 pairs
        assert_eq!(seen[1].2.len(), 0); // empty layer is a valid outcome
    }

    #[test]
    fn worker_count_does_not_change_results() {
        let sequential = collect(1);
        for workers in [2, 4, 8] {
            assert_eq!(collect(workers), sequential, "workers = {workers}");
        }
    }

    #[test]
    fn failed_layer_is_isolated() {
        let (factory, _) = fixture();
        let names = vec!["L1".to_string(), "NOPE".to_string(), "L3".to_string()];
        let mut outcomes = Vec::new();
        run_all::<_, _, ()>(
            &factory,
            &names,
            2,
            &MeasureParams::default(),
            |_, outcome| {
                outcomes.push((outcome.layer, outcome.result.is_ok()));
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(
            outcomes,
            vec![
                ("L1".to_string(), true),
                ("NOPE".to_string(), false),
                ("L3".to_string(), true),
            ]
        );
    }

    #[test]
    fn consumer_error_aborts_the_run() {
        let (factory, names) = fixture();
        let result = run_all(
            &factory,
            &names,
            4,
            &MeasureParams::default(),
            |idx, _| if idx == 0 { Err("stop") } else { Ok(()) },
        );
        assert_eq!(result.unwrap_err(), "stop");
    }
}
