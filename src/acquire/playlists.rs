use super::WorkingSet;
use crate::catalog::wire::PlaylistEntry;
use crate::catalog::{ApiResult, CatalogApi, Page};
use crate::config::PacingConfig;
use crate::ids::normalize_playlist_id;

/// Add tracks from the given playlists, in order, until `working` is full.
/// Returns how many new ids were added.
///
/// Each playlist is read through the item listing first. If that fails, the
/// playlist object is read instead and its nested item page is followed by
/// cursor. A playlist where both paths fail is skipped.
pub fn fetch_playlist_tracks<C: CatalogApi + ?Sized>(
    api: &C,
    playlist_refs: &[String],
    working: &mut WorkingSet,
    pacing: &PacingConfig,
) -> usize {
    let start = working.len();

    for raw in playlist_refs {
        if working.is_full() {
            break;
        }

        let pid = normalize_playlist_id(raw);
        if pid.is_empty() {
            continue;
        }

        let mark = working.mark();
        let before = working.len();
        let primary = drain_pages(
            api.playlist_items(&pid, None),
            |next| api.playlist_items(&pid, Some(next)),
            working,
            pacing.playlist_page_ms,
        );

        if let Err(e) = primary {
            log::info!("Item listing failed for playlist {pid} ({e}), reading playlist object");
            // Partial pages from the failed path would be re-read below
            working.rollback(mark);

            let fallback = drain_pages(
                api.playlist(&pid),
                |next| api.follow_playlist_cursor(next),
                working,
                pacing.playlist_page_ms,
            );
            if let Err(e2) = fallback {
                working.rollback(mark);
                log::warn!("Skipping playlist {pid}: {e2}");
                continue;
            }
        }

        log::debug!("Playlist {pid}: {} new tracks", working.len() - before);

        if !working.is_full() {
            PacingConfig::pause(pacing.playlist_page_ms);
        }
    }

    working.len() - start
}

/// Consume `first` and every page reachable through its cursor chain,
/// offering valid tracks until `working` is full or the chain ends.
fn drain_pages(
    first: ApiResult<Page<PlaylistEntry>>,
    mut next_page: impl FnMut(&str) -> ApiResult<Page<PlaylistEntry>>,
    working: &mut WorkingSet,
    pause_ms: u64,
) -> ApiResult<()> {
    let mut page = first?;
    loop {
        if page.items.is_empty() {
            return Ok(());
        }

        for entry in page.items {
            if let Some(t) = entry.track.and_then(|raw| raw.into_track_ref()) {
                working.offer(t);
                if working.is_full() {
                    return Ok(());
                }
            }
        }

        match page.next {
            Some(next) => {
                PacingConfig::pause(pause_ms);
                page = next_page(&next)?;
            }
            None => return Ok(()),
        }
    }
}
