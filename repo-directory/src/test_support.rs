use crate::crucible::{GitInformation, RawRepository, RepositoryLister, RepositoryPage};
use crate::error::{FetchError, FetchResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;
use std::collections::VecDeque;

pub fn repo(name: &str, location: &str) -> RawRepository {
    RawRepository {
        name: name.to_string(),
        git: Some(GitInformation {
            location: location.to_string()
        })
    }
}

pub fn page(start: u32, values: Vec<RawRepository>, last_page: bool) -> FetchResult<RepositoryPage> {
    Ok(RepositoryPage {
        start,
        size: values.len() as u32,
        last_page,
        values
    })
}

pub fn server_error(start: u32) -> FetchResult<RepositoryPage> {
    Err(FetchError::Status {
        url: format!("mock://repositories?start={start}"),
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: "boom".to_string()
    })
}

/// Serves queued pages in request order and records the requested offsets.
/// Each refresh cycle consumes pages from the front of the queue.
#[derive(Default)]
pub struct ScriptedLister {
    pages: Mutex<VecDeque<FetchResult<RepositoryPage>>>,
    requested: Mutex<Vec<(u32, u32)>>
}

impl ScriptedLister {
    pub fn new(pages: Vec<FetchResult<RepositoryPage>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            requested: Mutex::new(Vec::new())
        }
    }

    pub fn push(&self, pages: Vec<FetchResult<RepositoryPage>>) {
        self.pages.lock().extend(pages);
    }

    pub fn requested(&self) -> Vec<(u32, u32)> {
        self.requested.lock().clone()
    }
}

#[async_trait]
impl RepositoryLister for ScriptedLister {
    async fn list_page(&self, start: u32, limit: u32) -> FetchResult<RepositoryPage> {
        self.requested.lock().push((start, limit));
        self.pages
            .lock()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected request for offset {start}"))
    }

    fn page_url(&self, start: u32, limit: u32) -> String {
        format!("mock://repositories?start={start}&limit={limit}")
    }
}
