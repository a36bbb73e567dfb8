use crate::crucible::{RawRepository, RepositoryLister};
use crate::error::{FetchError, FetchResult};
use tracing::debug;

/// Everything returned by one complete walk of the paginated listing.
#[derive(Debug, Clone, Default)]
pub struct FetchedDirectory {
    pub repositories: Vec<RawRepository>,
    pub pages: u32
}

/// Walks the repository listing from offset 0 until a page reports itself
/// as the last one.
///
/// The next offset is the page's `start` plus its returned `size`, so a short
/// final page never triggers an extra request. A non-final page that does not
/// advance the offset aborts the walk instead of looping forever. The first
/// failing page aborts the whole walk; nothing is retried here.
pub async fn fetch_all(lister: &dyn RepositoryLister, page_size: u32) -> FetchResult<FetchedDirectory> {
    let mut fetched = FetchedDirectory::default();
    let mut start = 0u32;

    loop {
        let page = lister.list_page(start, page_size).await?;
        fetched.pages += 1;

        debug!(
            start = page.start,
            size = page.size,
            last_page = page.last_page,
            entries = page.values.len(),
            "Fetched repository page"
        );

        let is_last = page.last_page;
        let next = page.start.saturating_add(page.size);
        fetched.repositories.extend(page.values);

        if is_last {
            break;
        }

        if next <= start {
            return Err(FetchError::StalledPagination {
                url: lister.page_url(start, page_size),
                start
            });
        }
        start = next;
    }

    Ok(fetched)
}
