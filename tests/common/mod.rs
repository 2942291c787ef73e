#![allow(dead_code)]

use async_trait::async_trait;
use pagefetch::models::{FetchError, FlattenMode, PageIndex, StructuralError};
use pagefetch::{FetchSettings, PageSource, RawRecord, Result};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// A scripted failure injected before a page's normal reply.
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    Transient,
    Malformed,
}

/// Deterministic collection: page `p` holds `per_page` records whose metadata
/// keys depend on the page, so later pages keep discovering columns.
pub struct FakeCollection {
    per_page: usize,
    faults: Mutex<HashMap<PageIndex, VecDeque<Fault>>>,
    calls: Mutex<Vec<(PageIndex, Instant)>>,
}

impl FakeCollection {
    pub fn new(per_page: usize) -> Self {
        Self {
            per_page,
            faults: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail(&self, page: PageIndex, fault: Fault, times: usize) {
        let mut faults = self.faults.lock().unwrap();
        let queue = faults.entry(page).or_default();
        for _ in 0..times {
            queue.push_back(fault);
        }
    }

    pub fn calls(&self) -> Vec<PageIndex> {
        self.calls.lock().unwrap().iter().map(|(p, _)| *p).collect()
    }

    pub fn call_times(&self, page: PageIndex) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| *p == page)
            .map(|(_, t)| *t)
            .collect()
    }

    pub fn record(page: PageIndex, index: usize) -> RawRecord {
        let mut metadata = vec![json!({"key": "depth", "value": format!("{page}.{index}")})];
        if page % 2 == 0 {
            metadata.push(json!({"key": format!("even-{page}"), "value": "yes"}));
        }
        if index == 0 {
            metadata.push(json!({"key": format!("first-{page}"), "value": index}));
        }
        RawRecord::new(json!({
            "id": format!("S{page:03}-{index}"),
            "type": "samples",
            "attributes": {"sample-metadata": Value::Array(metadata)}
        }))
    }
}

#[async_trait]
impl PageSource for FakeCollection {
    async fn fetch_page(&self, page: PageIndex) -> Result<Vec<RawRecord>> {
        self.calls.lock().unwrap().push((page, Instant::now()));

        let fault = self
            .faults
            .lock()
            .unwrap()
            .get_mut(&page)
            .and_then(VecDeque::pop_front);
        match fault {
            Some(Fault::Transient) => Err(FetchError::HttpStatus {
                page,
                status: 502,
                message: "bad gateway".to_string(),
            }),
            Some(Fault::Malformed) => Ok(vec![
                Self::record(page, 0),
                RawRecord::new(json!({"type": "samples"})),
            ]),
            None => Ok((0..self.per_page).map(|i| Self::record(page, i)).collect()),
        }
    }
}

pub fn settings(dir: &Path, total_pages: u32) -> FetchSettings {
    FetchSettings {
        total_pages,
        retry_delay: Duration::from_secs(5),
        output_path: dir.join("output_data.csv"),
        checkpoint_path: dir.join("progress_tracker.txt"),
        flatten: FlattenMode::Metadata,
        metadata_field: "sample-metadata".to_string(),
    }
}

pub fn is_missing_id(err: &FetchError) -> bool {
    matches!(err, FetchError::Structural(StructuralError::MissingId { .. }))
}
