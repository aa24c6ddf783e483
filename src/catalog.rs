//! Master data: parts, workplaces, missing reasons and part requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{Error, Result};
use crate::store::{self, Collection, Document, DocumentStore, WriteOp};
use crate::task::record::{from_millis, to_millis};

/// A part or missing-reason entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub id: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Workplace {
    pub id: String,
    pub value: String,
    /// Minutes a task at this workplace is expected to take.
    pub standard_time: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartRequest {
    pub id: String,
    pub part_number: String,
    pub requested_by: Option<String>,
    pub requested_at: Option<DateTime<Utc>>,
}

/// Result of asking for a new catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RequestOutcome {
    Requested { id: String },
    AlreadyExists,
    AlreadyRequested,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValueDoc {
    #[serde(default)]
    value: String,
    #[serde(default)]
    standard_time: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestDoc {
    #[serde(default)]
    part_number: String,
    #[serde(default)]
    requested_by: Option<String>,
    #[serde(default)]
    requested_at: Option<i64>,
}

fn entry(doc: &Document) -> Option<Entry> {
    let value = doc.decode::<ValueDoc>().ok()?.value;
    Some(Entry {
        id: doc.id.clone(),
        value,
    })
}

fn normalize(value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::InvalidArgument("value cannot be empty".to_string()));
    }
    Ok(value.to_string())
}

/// Catalog operations over a document store.
pub struct Catalog<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> Catalog<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    fn entries(&self, collection: Collection) -> Result<Vec<Entry>> {
        let mut entries: Vec<Entry> = self
            .store
            .list(collection)?
            .iter()
            .filter_map(entry)
            .collect();
        entries.sort_by(|a, b| a.value.cmp(&b.value));
        Ok(entries)
    }

    fn delete_all(&self, collection: Collection) -> Result<usize> {
        let ops: Vec<WriteOp> = self
            .store
            .list(collection)?
            .into_iter()
            .map(|doc| WriteOp::Delete {
                collection,
                id: doc.id,
            })
            .collect();
        let count = ops.len();
        if count > 0 {
            self.store.batch(ops)?;
        }
        Ok(count)
    }

    // Parts

    pub fn parts(&self) -> Result<Vec<Entry>> {
        self.entries(Collection::Parts)
    }

    /// Case-insensitive lookup returning the catalog spelling.
    pub fn find_part(&self, value: &str) -> Result<Option<Entry>> {
        let needle = value.trim().to_uppercase();
        Ok(self
            .parts()?
            .into_iter()
            .find(|p| p.value.to_uppercase() == needle))
    }

    pub fn add_part(&self, value: &str) -> Result<String> {
        let value = normalize(value)?;
        if self.find_part(&value)?.is_some() {
            return Err(Error::InvalidArgument(format!("part '{value}' already exists")));
        }
        self.store
            .insert(Collection::Parts, store::fields([("value", json!(value))]))
    }

    /// Add one part per line; blank lines and known parts are skipped.
    pub fn add_parts<'l>(&self, lines: impl IntoIterator<Item = &'l str>) -> Result<usize> {
        let mut known: Vec<String> = self
            .parts()?
            .into_iter()
            .map(|p| p.value.to_uppercase())
            .collect();
        let mut ops = Vec::new();
        for line in lines {
            let value = line.trim();
            if value.is_empty() || known.contains(&value.to_uppercase()) {
                continue;
            }
            known.push(value.to_uppercase());
            ops.push(WriteOp::Insert {
                collection: Collection::Parts,
                id: None,
                data: store::fields([("value", json!(value))]),
            });
        }
        let count = ops.len();
        if count > 0 {
            self.store.batch(ops)?;
        }
        Ok(count)
    }

    pub fn remove_part(&self, id: &str) -> Result<()> {
        self.store.delete(Collection::Parts, id)
    }

    pub fn clear_parts(&self) -> Result<usize> {
        self.delete_all(Collection::Parts)
    }

    // Workplaces

    pub fn workplaces(&self) -> Result<Vec<Workplace>> {
        let mut workplaces: Vec<Workplace> = self
            .store
            .list(Collection::Workplaces)?
            .iter()
            .filter_map(|doc| {
                let raw = doc.decode::<ValueDoc>().ok()?;
                Some(Workplace {
                    id: doc.id.clone(),
                    value: raw.value,
                    standard_time: raw
                        .standard_time
                        .filter(|t| t.is_finite() && *t > 0.0)
                        .map(|t| t.round() as u32)
                        .unwrap_or(0),
                })
            })
            .collect();
        workplaces.sort_by(|a, b| a.value.cmp(&b.value));
        Ok(workplaces)
    }

    /// Exact-name lookup.
    pub fn find_workplace(&self, name: &str) -> Result<Option<Workplace>> {
        let name = name.trim();
        Ok(self.workplaces()?.into_iter().find(|w| w.value == name))
    }

    pub fn add_workplace(&self, name: &str, standard_time: Option<u32>) -> Result<String> {
        let name = normalize(name)?;
        if self.find_workplace(&name)?.is_some() {
            return Err(Error::InvalidArgument(format!(
                "workplace '{name}' already exists"
            )));
        }
        self.store.insert(
            Collection::Workplaces,
            store::fields([
                ("value", json!(name)),
                ("standardTime", json!(standard_time.unwrap_or(0))),
            ]),
        )
    }

    /// Import `Name;Minutes` lines. Unparsable minutes count as zero.
    pub fn add_workplaces<'l>(&self, lines: impl IntoIterator<Item = &'l str>) -> Result<usize> {
        let ops: Vec<WriteOp> = lines
            .into_iter()
            .filter_map(parse_workplace_line)
            .map(|(name, minutes)| WriteOp::Insert {
                collection: Collection::Workplaces,
                id: None,
                data: store::fields([
                    ("value", json!(name)),
                    ("standardTime", json!(minutes)),
                ]),
            })
            .collect();
        let count = ops.len();
        if count > 0 {
            self.store.batch(ops)?;
        }
        Ok(count)
    }

    pub fn remove_workplace(&self, id: &str) -> Result<()> {
        self.store.delete(Collection::Workplaces, id)
    }

    pub fn clear_workplaces(&self) -> Result<usize> {
        self.delete_all(Collection::Workplaces)
    }

    // Missing reasons

    pub fn missing_reasons(&self) -> Result<Vec<Entry>> {
        self.entries(Collection::MissingReasons)
    }

    pub fn add_missing_reason(&self, value: &str) -> Result<String> {
        let value = normalize(value)?;
        self.store.insert(
            Collection::MissingReasons,
            store::fields([("value", json!(value))]),
        )
    }

    pub fn remove_missing_reason(&self, id: &str) -> Result<()> {
        self.store.delete(Collection::MissingReasons, id)
    }

    // Part requests

    /// Pending requests, newest first.
    pub fn part_requests(&self) -> Result<Vec<PartRequest>> {
        let mut requests: Vec<PartRequest> = self
            .store
            .list(Collection::PartRequests)?
            .iter()
            .filter_map(|doc| {
                let raw = doc.decode::<RequestDoc>().ok()?;
                Some(PartRequest {
                    id: doc.id.clone(),
                    part_number: raw.part_number,
                    requested_by: raw.requested_by,
                    requested_at: raw.requested_at.and_then(from_millis),
                })
            })
            .collect();
        requests.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(requests)
    }

    /// Ask for a part to be added. Rejects (case-insensitively) parts that
    /// already exist or were already requested.
    pub fn request_part(
        &self,
        part_number: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<RequestOutcome> {
        let part_number = normalize(part_number)?;
        if self.find_part(&part_number)?.is_some() {
            return Ok(RequestOutcome::AlreadyExists);
        }
        let wanted = part_number.to_uppercase();
        if self
            .part_requests()?
            .iter()
            .any(|r| r.part_number.to_uppercase() == wanted)
        {
            return Ok(RequestOutcome::AlreadyRequested);
        }

        let id = self.store.insert(
            Collection::PartRequests,
            store::fields([
                ("partNumber", json!(part_number)),
                ("requestedBy", json!(actor)),
                ("requestedAt", json!(to_millis(now))),
            ]),
        )?;
        tracing::info!(part = %part_number, actor, "part requested");
        Ok(RequestOutcome::Requested { id })
    }

    fn part_request(&self, id: &str) -> Result<PartRequest> {
        self.part_requests()?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::DocumentNotFound {
                collection: Collection::PartRequests.to_string(),
                id: id.to_string(),
            })
    }

    /// Add the requested part and drop the request atomically.
    pub fn approve_part_request(&self, id: &str) -> Result<PartRequest> {
        let request = self.part_request(id)?;
        let mut ops = vec![WriteOp::Delete {
            collection: Collection::PartRequests,
            id: request.id.clone(),
        }];
        if self.find_part(&request.part_number)?.is_none() {
            ops.insert(
                0,
                WriteOp::Insert {
                    collection: Collection::Parts,
                    id: None,
                    data: store::fields([("value", json!(request.part_number))]),
                },
            );
        }
        self.store.batch(ops)?;
        Ok(request)
    }

    pub fn reject_part_request(&self, id: &str) -> Result<PartRequest> {
        let request = self.part_request(id)?;
        self.store.delete(Collection::PartRequests, &request.id)?;
        Ok(request)
    }
}

fn parse_workplace_line(line: &str) -> Option<(String, u32)> {
    let mut fields = line.split(';');
    let name = fields.next()?.trim();
    if name.is_empty() {
        return None;
    }
    let minutes = fields
        .next()
        .and_then(|raw| raw.trim().parse::<u32>().ok())
        .unwrap_or(0);
    Some((name.to_string(), minutes))
}
