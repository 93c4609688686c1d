// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decides which region downloads which file from where.
//!
//! Planning is a pure function of the current inventory so the
//! orchestrator can re-plan after every state change; randomness comes
//! in through the caller's RNG, which tests seed deterministically.

use image_common::MAX_SOURCES;
use image_common::ResourceDownloadParam;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Deserialize;
use serde::Serialize;
use slog::Logger;
use slog::warn;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// One download to run in one region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchJob {
    pub region: String,
    pub param: ResourceDownloadParam,
}

/// The planner's output: upstream fetches to run first, then
/// region-to-region copies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncPlan {
    /// Files no region holds yet; one elected region fetches each from
    /// its upstream source, through the proxy if one is configured.
    pub upstream_jobs: Vec<FetchJob>,
    /// Files some region already holds; every region still missing them
    /// copies from the holders, never through the proxy.
    pub sync_jobs: Vec<FetchJob>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.upstream_jobs.is_empty() && self.sync_jobs.is_empty()
    }
}

/// Plans one round of downloads.
///
/// `endpoints` maps each region to the base URLs its file service
/// answers on; `holders` maps a file's digest to the regions holding a
/// valid copy.  A region never appears in the source list of its own
/// job, and peer source lists are capped at [`MAX_SOURCES`] entries
/// picked at random.
pub fn plan_sync<R: Rng + ?Sized>(
    log: &Logger,
    rng: &mut R,
    resources: &[ResourceDownloadParam],
    endpoints: &BTreeMap<String, Vec<String>>,
    holders: &BTreeMap<String, BTreeSet<String>>,
    http_proxy: Option<&str>,
) -> SyncPlan {
    let mut plan = SyncPlan::default();
    let regions: Vec<&String> = endpoints.keys().collect();

    for param in resources {
        let holding: Vec<&String> = holders
            .get(&param.sha256)
            .map(|held| {
                regions
                    .iter()
                    .copied()
                    .filter(|region| held.contains(*region))
                    .collect()
            })
            .unwrap_or_default();
        let missing: Vec<&String> = regions
            .iter()
            .copied()
            .filter(|region| !holding.contains(region))
            .collect();
        if missing.is_empty() {
            continue;
        }

        if holding.is_empty() {
            if param.source_list.is_empty() {
                warn!(
                    log,
                    "boot resource has no local copy and no upstream \
                     source";
                    "filename" => &param.filename_on_disk,
                );
                continue;
            }
            // Exactly one region talks upstream; the others copy from
            // it on the next round.
            let Some(elected) = regions.choose(rng) else {
                continue;
            };
            let mut param = param.clone();
            param.http_proxy = http_proxy.map(str::to_string);
            plan.upstream_jobs.push(FetchJob {
                region: (*elected).clone(),
                param,
            });
            continue;
        }

        let mut sources: Vec<String> = holding
            .iter()
            .flat_map(|region| {
                endpoints[*region].iter().map(|endpoint| {
                    format!("{endpoint}{}/", param.filename_on_disk)
                })
            })
            .collect();
        sources.shuffle(rng);
        sources.truncate(MAX_SOURCES);

        for region in missing {
            let mut param = param.clone();
            param.source_list = sources.clone();
            param.http_proxy = None;
            plan.sync_jobs
                .push(FetchJob { region: region.clone(), param });
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use image_test_utils::dev::test_setup_log;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn param(seed: u8, upstream: bool) -> ResourceDownloadParam {
        let sha256 = hex::encode([seed; 32]);
        let filename_on_disk = sha256[..7].to_string();
        ResourceDownloadParam {
            rfile_ids: vec![seed as i64],
            source_list: if upstream {
                vec![format!("http://upstream/{filename_on_disk}")]
            } else {
                vec![]
            },
            sha256,
            filename_on_disk,
            total_size: 1024,
            extract_paths: vec![],
            http_proxy: None,
        }
    }

    fn endpoints(regions: &[&str]) -> BTreeMap<String, Vec<String>> {
        regions
            .iter()
            .map(|region| {
                (
                    region.to_string(),
                    vec![format!("http://{region}:5248/images/")],
                )
            })
            .collect()
    }

    fn holders(
        entries: &[(&ResourceDownloadParam, &[&str])],
    ) -> BTreeMap<String, BTreeSet<String>> {
        entries
            .iter()
            .map(|(param, regions)| {
                (
                    param.sha256.clone(),
                    regions.iter().map(|r| r.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn held_files_fan_out_to_missing_regions_only() {
        let logctx =
            test_setup_log("held_files_fan_out_to_missing_regions_only");
        let mut rng = StdRng::seed_from_u64(7);
        let file = param(1, true);
        let endpoints = endpoints(&["r1", "r2", "r3"]);
        let holders = holders(&[(&file, &["r1"])]);

        let plan = plan_sync(
            &logctx.log,
            &mut rng,
            &[file.clone()],
            &endpoints,
            &holders,
            None,
        );
        assert!(plan.upstream_jobs.is_empty());
        assert_eq!(plan.sync_jobs.len(), 2);
        for job in &plan.sync_jobs {
            assert_ne!(job.region, "r1");
            assert_eq!(
                job.param.source_list,
                vec![format!(
                    "http://r1:5248/images/{}/",
                    file.filename_on_disk
                )]
            );
            assert_eq!(job.param.http_proxy, None);
        }
        logctx.cleanup_successful();
    }

    #[test]
    fn regions_never_source_from_themselves() {
        let logctx =
            test_setup_log("regions_never_source_from_themselves");
        let file = param(2, true);
        let regions = ["r1", "r2", "r3", "r4"];
        let endpoints = endpoints(&regions);
        let holders = holders(&[(&file, &["r2", "r4"])]);

        for seed in 0..32 {
            let mut rng = StdRng::seed_from_u64(seed);
            let plan = plan_sync(
                &logctx.log,
                &mut rng,
                &[file.clone()],
                &endpoints,
                &holders,
                None,
            );
            for job in &plan.sync_jobs {
                let own_host = format!("http://{}:", job.region);
                assert!(
                    job.param
                        .source_list
                        .iter()
                        .all(|src| !src.starts_with(&own_host)),
                    "region {} offered itself as a source",
                    job.region
                );
            }
        }
        logctx.cleanup_successful();
    }

    #[test]
    fn peer_source_lists_are_capped() {
        let logctx = test_setup_log("peer_source_lists_are_capped");
        let mut rng = StdRng::seed_from_u64(7);
        let file = param(3, true);
        let regions: Vec<String> =
            (1..=9).map(|i| format!("r{i}")).collect();
        let names: Vec<&str> =
            regions.iter().map(String::as_str).collect();
        let endpoints = endpoints(&names);
        let holding: Vec<&str> = names[..8].to_vec();
        let holders = holders(&[(&file, &holding)]);

        let plan = plan_sync(
            &logctx.log,
            &mut rng,
            &[file],
            &endpoints,
            &holders,
            None,
        );
        assert_eq!(plan.sync_jobs.len(), 1);
        assert_eq!(plan.sync_jobs[0].param.source_list.len(), MAX_SOURCES);
        logctx.cleanup_successful();
    }

    #[test]
    fn unheld_files_go_upstream_through_the_proxy() {
        let logctx =
            test_setup_log("unheld_files_go_upstream_through_the_proxy");
        let mut rng = StdRng::seed_from_u64(7);
        let file = param(4, true);
        let endpoints = endpoints(&["r1", "r2"]);
        let holders = holders(&[]);

        let plan = plan_sync(
            &logctx.log,
            &mut rng,
            &[file.clone()],
            &endpoints,
            &holders,
            Some("http://proxy:3128"),
        );
        assert!(plan.sync_jobs.is_empty());
        assert_eq!(plan.upstream_jobs.len(), 1);
        let job = &plan.upstream_jobs[0];
        assert!(["r1", "r2"].contains(&job.region.as_str()));
        assert_eq!(job.param.source_list, file.source_list);
        assert_eq!(
            job.param.http_proxy.as_deref(),
            Some("http://proxy:3128")
        );
        logctx.cleanup_successful();
    }

    #[test]
    fn fully_synced_resources_produce_no_jobs() {
        let logctx =
            test_setup_log("fully_synced_resources_produce_no_jobs");
        let mut rng = StdRng::seed_from_u64(7);
        let file = param(5, true);
        let endpoints = endpoints(&["r1", "r2"]);
        let holders = holders(&[(&file, &["r1", "r2"])]);

        let plan = plan_sync(
            &logctx.log,
            &mut rng,
            &[file],
            &endpoints,
            &holders,
            None,
        );
        assert!(plan.is_empty());
        logctx.cleanup_successful();
    }

    #[test]
    fn orphaned_files_without_upstream_are_skipped() {
        let logctx =
            test_setup_log("orphaned_files_without_upstream_are_skipped");
        let mut rng = StdRng::seed_from_u64(7);
        // An uploaded file lost from every region has nowhere to come
        // from; the planner leaves it for the operator.
        let file = param(6, false);
        let endpoints = endpoints(&["r1", "r2"]);
        let holders = holders(&[]);

        let plan = plan_sync(
            &logctx.log,
            &mut rng,
            &[file],
            &endpoints,
            &holders,
            None,
        );
        assert!(plan.is_empty());
        logctx.cleanup_successful();
    }
}
