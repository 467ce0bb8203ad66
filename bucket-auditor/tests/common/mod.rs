//! In-memory fakes of the capability traits shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bucket_auditor::analyzer::{FindingFilter, FindingPages, FindingSource};
use bucket_auditor::public_endpoint::PublicReader;
use bucket_auditor::store::ObjectStore;
use bucket_auditor::types::{AnalyzerFinding, AnalyzerHandle, AuditorConfig, BucketName};
use bucket_auditor::{AuditorError, Result, RunControl};
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Object store keeping objects in memory and recording every call.
#[derive(Default)]
pub struct FakeStore {
    pub buckets: Vec<String>,
    /// Listing error message and whether it is retryable.
    pub listing_error: Option<(String, bool)>,
    pub denied_writes: HashSet<String>,
    pub failing_deletes: HashSet<String>,
    pub panicking_puts: HashSet<String>,
    pub panicking_deletes: HashSet<String>,
    pub objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    pub puts: Mutex<Vec<(String, String)>>,
    pub deletes: Mutex<Vec<(String, String)>>,
    pub list_calls: Mutex<usize>,
}

impl FakeStore {
    pub fn with_buckets(names: &[&str]) -> Self {
        Self {
            buckets: names.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn deny_writes(mut self, bucket: &str) -> Self {
        self.denied_writes.insert(bucket.to_string());
        self
    }

    pub fn fail_deletes(mut self, bucket: &str) -> Self {
        self.failing_deletes.insert(bucket.to_string());
        self
    }

    pub fn panic_on_put(mut self, bucket: &str) -> Self {
        self.panicking_puts.insert(bucket.to_string());
        self
    }

    pub fn panic_on_delete(mut self, bucket: &str) -> Self {
        self.panicking_deletes.insert(bucket.to_string());
        self
    }

    /// Listing fails with a permanent error such as `AccessDenied`.
    pub fn failing_listing(message: &str) -> Self {
        Self {
            listing_error: Some((message.to_string(), false)),
            ..Default::default()
        }
    }

    /// Listing fails with a retryable error such as `SlowDown`.
    pub fn throttled_listing(message: &str) -> Self {
        Self {
            listing_error: Some((message.to_string(), true)),
            ..Default::default()
        }
    }

    pub fn list_call_count(&self) -> usize {
        *self.list_calls.lock().unwrap()
    }

    pub fn put_count(&self, bucket: &str) -> usize {
        self.puts.lock().unwrap().iter().filter(|(b, _)| b == bucket).count()
    }

    pub fn delete_count(&self, bucket: &str) -> usize {
        self.deletes.lock().unwrap().iter().filter(|(b, _)| b == bucket).count()
    }

    pub fn has_objects(&self, bucket: &str) -> bool {
        self.objects.lock().unwrap().keys().any(|(b, _)| b == bucket)
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.objects
            .lock()
            .unwrap()
            .contains_key(&(bucket.to_string(), key.to_string()))
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn list_buckets(&self) -> Result<Vec<BucketName>> {
        *self.list_calls.lock().unwrap() += 1;
        if let Some((message, retryable)) = &self.listing_error {
            return Err(AuditorError::BucketListing {
                message: message.clone(),
                retryable: *retryable,
            });
        }
        Ok(self.buckets.iter().map(|b| BucketName::from(b.as_str())).collect())
    }

    async fn put_object(&self, bucket: &BucketName, key: &str, body: &[u8]) -> Result<()> {
        self.puts
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string()));
        if self.panicking_puts.contains(bucket.as_str()) {
            panic!("store exploded writing to {}", bucket);
        }
        if self.denied_writes.contains(bucket.as_str()) {
            return Err(AuditorError::ObjectStore {
                bucket: bucket.to_string(),
                message: "AccessDenied".to_string(),
            });
        }
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), body.to_vec());
        Ok(())
    }

    async fn delete_object(&self, bucket: &BucketName, key: &str) -> Result<()> {
        self.deletes
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string()));
        if self.panicking_deletes.contains(bucket.as_str()) {
            panic!("store exploded deleting from {}", bucket);
        }
        if self.failing_deletes.contains(bucket.as_str()) {
            return Err(AuditorError::ObjectStore {
                bucket: bucket.to_string(),
                message: "InternalError".to_string(),
            });
        }
        self.objects
            .lock()
            .unwrap()
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}

/// Anonymous reader answering from the fake store: 200 when the bucket is
/// public and the object exists, 403 when private, 404 when missing.
pub struct FakeReader {
    pub store: Arc<FakeStore>,
    pub public_buckets: HashSet<String>,
    pub erroring: HashSet<String>,
    pub panicking: HashSet<String>,
    pub calls: Mutex<Vec<(String, String)>>,
    /// Time each request takes.
    pub latency: Duration,
    /// Cancelled as soon as the first request arrives.
    pub cancels: Option<RunControl>,
}

impl FakeReader {
    pub fn new(store: Arc<FakeStore>, public: &[&str]) -> Self {
        Self {
            store,
            public_buckets: public.iter().map(|n| n.to_string()).collect(),
            erroring: HashSet::new(),
            panicking: HashSet::new(),
            calls: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
            cancels: None,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn cancelling(mut self, control: RunControl) -> Self {
        self.cancels = Some(control);
        self
    }

    pub fn erroring_on(mut self, bucket: &str) -> Self {
        self.erroring.insert(bucket.to_string());
        self
    }

    pub fn panicking_on(mut self, bucket: &str) -> Self {
        self.panicking.insert(bucket.to_string());
        self
    }

    pub fn call_count(&self, bucket: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(b, _)| b == bucket).count()
    }
}

#[async_trait]
impl PublicReader for FakeReader {
    async fn head(&self, bucket: &BucketName, key: &str) -> Result<u16> {
        self.calls
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string()));

        if let Some(control) = &self.cancels {
            control.cancel();
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.panicking.contains(bucket.as_str()) {
            panic!("reader exploded for {}", bucket);
        }
        if self.erroring.contains(bucket.as_str()) {
            return Err(AuditorError::PublicEndpoint("dns error".to_string()));
        }
        if !self.store.contains(bucket.as_str(), key) {
            return Ok(404);
        }
        if self.public_buckets.contains(bucket.as_str()) {
            Ok(200)
        } else {
            Ok(403)
        }
    }
}

/// Finding source replaying a scripted list of pages.
pub struct FakeFindingSource {
    pub analyzers: std::result::Result<Vec<AnalyzerHandle>, String>,
    pub pages: Vec<std::result::Result<Vec<AnalyzerFinding>, String>>,
    pub queried: Mutex<Vec<String>>,
}

impl FakeFindingSource {
    pub fn no_analyzers() -> Self {
        Self {
            analyzers: Ok(Vec::new()),
            pages: Vec::new(),
            queried: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_analyzers(message: &str) -> Self {
        Self {
            analyzers: Err(message.to_string()),
            pages: Vec::new(),
            queried: Mutex::new(Vec::new()),
        }
    }

    pub fn with_pages(pages: Vec<std::result::Result<Vec<AnalyzerFinding>, String>>) -> Self {
        Self {
            analyzers: Ok(vec![analyzer("console"), analyzer("secondary")]),
            pages,
            queried: Mutex::new(Vec::new()),
        }
    }

    pub fn public(buckets: &[&str]) -> Self {
        Self::with_pages(vec![Ok(buckets.iter().map(|b| bucket_finding(b)).collect())])
    }
}

#[async_trait]
impl FindingSource for FakeFindingSource {
    async fn list_analyzers(&self) -> Result<Vec<AnalyzerHandle>> {
        self.analyzers
            .clone()
            .map_err(AuditorError::analyzer)
    }

    fn findings<'a>(
        &'a self,
        analyzer: &'a AnalyzerHandle,
        _filter: &'a FindingFilter,
    ) -> FindingPages<'a> {
        self.queried.lock().unwrap().push(analyzer.name.clone());
        let pages: Vec<Result<Vec<AnalyzerFinding>>> = self
            .pages
            .iter()
            .cloned()
            .map(|page| page.map_err(AuditorError::analyzer))
            .collect();
        stream::iter(pages).boxed()
    }
}

pub fn analyzer(name: &str) -> AnalyzerHandle {
    AnalyzerHandle {
        arn: format!("arn:aws:access-analyzer:eu-west-1:123456789012:analyzer/{}", name),
        name: name.to_string(),
    }
}

pub fn bucket_finding(bucket: &str) -> AnalyzerFinding {
    AnalyzerFinding {
        resource: Some(format!("arn:aws:s3:::{}", bucket)),
        resource_type: "AWS::S3::Bucket".to_string(),
        is_public: true,
    }
}

pub fn test_config() -> AuditorConfig {
    AuditorConfig {
        region: "eu-west-1".to_string(),
        profile: None,
        concurrency: 4,
        call_timeout_secs: 5,
        max_retries: 0,
        ..Default::default()
    }
}
