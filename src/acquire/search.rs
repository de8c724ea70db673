use super::WorkingSet;
use crate::catalog::CatalogApi;
use crate::config::PacingConfig;

/// Results per search page.
pub const SEARCH_PAGE_SIZE: usize = 50;

/// The search listing rejects offsets past this point.
const MAX_SEARCH_OFFSET: usize = 1000;

/// Add tracks matching a free-text query, offset-paginated, until `working`
/// is full. Returns how many new ids were added.
///
/// Paging ends on an empty page or when the listing reports no next page.
/// A failed page ends the search; what was already collected is kept.
pub fn search_tracks<C: CatalogApi + ?Sized>(
    api: &C,
    query: &str,
    working: &mut WorkingSet,
    pacing: &PacingConfig,
) -> usize {
    let start = working.len();
    if query.trim().is_empty() {
        return 0;
    }

    let mut offset = 0;
    while !working.is_full() {
        if offset >= MAX_SEARCH_OFFSET {
            log::debug!("Search '{query}' hit the offset ceiling at {offset}");
            break;
        }

        let page = match api.search_tracks(query, offset, SEARCH_PAGE_SIZE) {
            Ok(page) => page,
            Err(e) => {
                log::warn!("Search '{query}' failed at offset {offset}: {e}");
                break;
            }
        };

        if page.items.is_empty() {
            break;
        }

        for raw in page.items {
            if let Some(t) = raw.into_track_ref() {
                working.offer(t);
                if working.is_full() {
                    return working.len() - start;
                }
            }
        }

        // Null entries are dropped before we see the page, so a short page
        // is not necessarily the last one
        if page.next.is_none() {
            break;
        }
        offset += SEARCH_PAGE_SIZE;
        PacingConfig::pause(pacing.search_page_ms);
    }

    log::debug!("Search '{query}': {} new tracks", working.len() - start);
    working.len() - start
}
