use super::WorkingSet;
use crate::catalog::CatalogApi;
use crate::config::PacingConfig;

/// Results per new-releases page and per release track listing.
pub const RELEASE_PAGE_SIZE: usize = 50;

/// Hard cap on releases considered per run.
pub const MAX_RELEASES: usize = 500;

/// Add tracks from catalog-wide new releases until `working` is full.
/// Returns how many new ids were added.
///
/// The tracks-of-a-release listing is simplified (no popularity), so every
/// listed track not already collected is re-fetched as a full track object.
/// A failing release or track is skipped.
pub fn new_release_tracks<C: CatalogApi + ?Sized>(
    api: &C,
    working: &mut WorkingSet,
    pacing: &PacingConfig,
) -> usize {
    let start = working.len();
    if working.is_full() {
        return 0;
    }

    let release_ids = list_release_ids(api, pacing);
    log::info!("New releases: {} releases to expand", release_ids.len());

    for release_id in &release_ids {
        let listing = match api.release_tracks(release_id, RELEASE_PAGE_SIZE) {
            Ok(page) => page,
            Err(e) => {
                log::warn!("Skipping release {release_id}: {e}");
                continue;
            }
        };

        for simplified in &listing.items {
            let Some(track_id) = simplified.valid_id() else {
                continue;
            };
            if working.skip_known(track_id) {
                continue;
            }
            match api.track(track_id) {
                Ok(full) => {
                    if let Some(t) = full.into_track_ref() {
                        working.offer(t);
                        if working.is_full() {
                            return working.len() - start;
                        }
                    }
                }
                Err(e) => log::warn!("Skipping track {track_id} of release {release_id}: {e}"),
            }
        }

        PacingConfig::pause(pacing.release_ms);
    }

    working.len() - start
}

/// Page through the new-releases listing, up to [`MAX_RELEASES`] ids.
fn list_release_ids<C: CatalogApi + ?Sized>(api: &C, pacing: &PacingConfig) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    let mut offset = 0;

    while ids.len() < MAX_RELEASES {
        let page = match api.new_releases(offset, RELEASE_PAGE_SIZE) {
            Ok(page) => page,
            Err(e) => {
                log::warn!("New-release listing failed at offset {offset}: {e}");
                break;
            }
        };
        if page.items.is_empty() {
            break;
        }

        ids.extend(
            page.items
                .into_iter()
                .filter_map(|r| r.id)
                .filter(|id| !id.is_empty()),
        );

        if page.next.is_none() {
            break;
        }
        offset += RELEASE_PAGE_SIZE;
        PacingConfig::pause(pacing.release_page_ms);
    }

    ids.truncate(MAX_RELEASES);
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fake::{raw_track, tid, Call, FakeCatalog};
    use crate::catalog::wire::{RawRelease, RawTrack};
    use crate::models::TrackRef;

    fn release(id: &str) -> RawRelease {
        RawRelease { id: Some(id.to_string()), name: Some(format!("Album {id}")) }
    }

    /// `n_releases` releases with `per_release` tracks each; full objects carry popularity.
    fn api_with(n_releases: usize, per_release: usize) -> FakeCatalog {
        let mut api = FakeCatalog::default();
        for r in 0..n_releases {
            let rid = format!("alb{r:0>19}");
            api.releases.push(release(&rid));
            let mut listing = Vec::new();
            for t in 0..per_release {
                let id = tid(r * 100 + t);
                listing.push(raw_track(&id, None));
                api.full_tracks.insert(id.clone(), raw_track(&id, Some(60)));
            }
            api.release_tracks.insert(rid, listing);
        }
        api
    }

    fn expand(api: &FakeCatalog, limit: usize) -> Vec<TrackRef> {
        let mut working = WorkingSet::new(limit);
        let added = new_release_tracks(api, &mut working, &PacingConfig::none());
        assert_eq!(added, working.len());
        working.into_tracks()
    }

    #[test]
    fn test_expands_releases_with_full_tracks() {
        let api = api_with(2, 3);
        let tracks = expand(&api, 100);
        assert_eq!(tracks.len(), 6);
        assert!(tracks.iter().all(|t| t.popularity == Some(60)));
        assert_eq!(tracks[3].id, tid(100));
    }

    #[test]
    fn test_stops_at_limit() {
        let api = api_with(3, 4);
        let tracks = expand(&api, 5);
        assert_eq!(tracks.len(), 5);
        let last = api.calls().last().cloned().unwrap();
        assert_eq!(last, Call::Track(tid(100)));
    }

    #[test]
    fn test_release_cap() {
        let api = api_with(520, 0);
        let tracks = expand(&api, 10);
        assert!(tracks.is_empty());
        let listed = api
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::ReleaseTracks(_)))
            .count();
        assert_eq!(listed, MAX_RELEASES);
        let pages = api
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::NewReleases { .. }))
            .count();
        assert_eq!(pages, MAX_RELEASES / RELEASE_PAGE_SIZE);
    }

    #[test]
    fn test_failing_release_and_track_isolated() {
        let mut api = api_with(3, 2);
        api.failing_releases.insert(format!("alb{:0>19}", 0));
        api.full_tracks.remove(&tid(100));
        let tracks = expand(&api, 100);
        let ids: Vec<_> = tracks.iter().map(|t| t.id.clone()).collect();
        assert_eq!(ids, vec![tid(101), tid(200), tid(201)]);
    }

    #[test]
    fn test_invalid_listing_ids_never_fetched() {
        let mut api = api_with(1, 1);
        let rid = format!("alb{:0>19}", 0);
        api.release_tracks.get_mut(&rid).unwrap().push(RawTrack {
            id: Some("short".into()),
            ..RawTrack::default()
        });
        let tracks = expand(&api, 100);
        assert_eq!(tracks.len(), 1);
        assert!(!api.calls().contains(&Call::Track("short".into())));
    }

    #[test]
    fn test_known_tracks_not_refetched() {
        let api = api_with(1, 3);
        let mut working = WorkingSet::new(10);
        working.offer(raw_track(&tid(1), Some(90)).into_track_ref().unwrap());
        let added = new_release_tracks(&api, &mut working, &PacingConfig::none());
        assert_eq!(added, 2);
        assert_eq!(working.duplicates(), 1);
        assert!(!api.calls().contains(&Call::Track(tid(1))));
        let tracks = working.into_tracks();
        assert_eq!(tracks[0].popularity, Some(90));
    }
}
