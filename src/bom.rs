//! Bill of materials: parent part to child part multipliers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::catalog::RequestOutcome;
use crate::error::{Error, Result};
use crate::store::{self, Collection, Document, DocumentStore, WriteOp};
use crate::task::record::{from_millis, to_millis};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BomItem {
    pub id: String,
    pub parent_part: String,
    pub child_part: String,
    pub quantity: f64,
}

/// One child line of an expansion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BomLine {
    pub child_part: String,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BomRequest {
    pub id: String,
    pub parent_part: String,
    pub requested_by: Option<String>,
    pub requested_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemDoc {
    parent_part: String,
    child_part: String,
    quantity: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestDoc {
    #[serde(default)]
    parent_part: String,
    #[serde(default)]
    requested_by: Option<String>,
    #[serde(default)]
    requested_at: Option<i64>,
}

fn item(doc: &Document) -> Option<BomItem> {
    match doc.decode::<ItemDoc>() {
        Ok(raw) => Some(BomItem {
            id: doc.id.clone(),
            parent_part: raw.parent_part,
            child_part: raw.child_part,
            quantity: raw.quantity,
        }),
        Err(err) => {
            tracing::warn!(id = %doc.id, error = %err, "skipping malformed bom item");
            None
        }
    }
}

fn same_part(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Validate one edge and return its trimmed parts.
fn check_edge(parent: &str, child: &str, quantity: f64) -> Result<(String, String)> {
    let parent = parent.trim();
    let child = child.trim();
    if parent.is_empty() || child.is_empty() {
        return Err(Error::InvalidArgument(
            "parent and child parts are required".to_string(),
        ));
    }
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(Error::InvalidArgument(format!(
            "bom quantity must be a positive number, got {quantity}"
        )));
    }
    if same_part(parent, child) {
        return Err(Error::InvalidArgument(format!(
            "part '{parent}' cannot be its own child"
        )));
    }
    Ok((parent.to_string(), child.to_string()))
}

fn item_op(parent: String, child: String, quantity: f64) -> WriteOp {
    WriteOp::Insert {
        collection: Collection::BomItems,
        id: None,
        data: store::fields([
            ("parentPart", json!(parent)),
            ("childPart", json!(child)),
            ("quantity", json!(quantity)),
        ]),
    }
}

/// Parse `PARENT;CHILD;QTY`. Decimal commas are accepted.
pub fn parse_line(line: &str) -> Result<(String, String, f64)> {
    let mut fields = line.split(';').map(str::trim);
    let (Some(parent), Some(child), Some(qty)) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(Error::InvalidArgument(format!(
            "expected PARENT;CHILD;QTY, got '{line}'"
        )));
    };
    let quantity: f64 = qty.replace(',', ".").parse().map_err(|_| {
        Error::InvalidArgument(format!("invalid bom quantity '{qty}' in '{line}'"))
    })?;
    let (parent, child) = check_edge(parent, child, quantity)?;
    Ok((parent, child, quantity))
}

pub struct Bom<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> Bom<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Items in insertion order, optionally for one parent.
    pub fn items(&self, parent: Option<&str>) -> Result<Vec<BomItem>> {
        Ok(self
            .store
            .list(Collection::BomItems)?
            .iter()
            .filter_map(item)
            .filter(|i| parent.map_or(true, |p| same_part(&i.parent_part, p)))
            .collect())
    }

    pub fn add(&self, parent: &str, child: &str, quantity: f64) -> Result<String> {
        let (parent, child) = check_edge(parent, child, quantity)?;
        let ids = self.store.batch(vec![item_op(parent, child, quantity)])?;
        ids.into_iter()
            .next()
            .ok_or_else(|| Error::OperationFailed("bom insert returned no id".to_string()))
    }

    /// Import `PARENT;CHILD;QTY` lines in one batch. Blank lines are
    /// skipped; any malformed line rejects the whole import.
    pub fn import<'l>(&self, lines: impl IntoIterator<Item = &'l str>) -> Result<usize> {
        let mut ops = Vec::new();
        for line in lines.into_iter().filter(|l| !l.trim().is_empty()) {
            let (parent, child, quantity) = parse_line(line)?;
            ops.push(item_op(parent, child, quantity));
        }
        let count = ops.len();
        if count > 0 {
            self.store.batch(ops)?;
        }
        tracing::info!(count, "bom items imported");
        Ok(count)
    }

    pub fn remove(&self, id: &str) -> Result<()> {
        self.store.delete(Collection::BomItems, id)
    }

    /// Children of `parent` scaled by `quantity`. One level only.
    pub fn expand(&self, parent: &str, quantity: f64) -> Result<Vec<BomLine>> {
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(Error::InvalidArgument(format!(
                "quantity must be a positive number, got {quantity}"
            )));
        }
        Ok(self
            .items(Some(parent))?
            .into_iter()
            .map(|i| BomLine {
                child_part: i.child_part,
                quantity: i.quantity * quantity,
            })
            .collect())
    }

    // Requests

    /// Pending requests, newest first.
    pub fn requests(&self) -> Result<Vec<BomRequest>> {
        let mut requests: Vec<BomRequest> = self
            .store
            .list(Collection::BomRequests)?
            .iter()
            .filter_map(|doc| {
                let raw = doc.decode::<RequestDoc>().ok()?;
                Some(BomRequest {
                    id: doc.id.clone(),
                    parent_part: raw.parent_part,
                    requested_by: raw.requested_by,
                    requested_at: raw.requested_at.and_then(from_millis),
                })
            })
            .collect();
        requests.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(requests)
    }

    /// Ask for a BOM to be defined for `parent`.
    pub fn request(&self, parent: &str, actor: &str, now: DateTime<Utc>) -> Result<RequestOutcome> {
        let parent = parent.trim();
        if parent.is_empty() {
            return Err(Error::InvalidArgument("parent part is required".to_string()));
        }
        if !self.items(Some(parent))?.is_empty() {
            return Ok(RequestOutcome::AlreadyExists);
        }
        if self
            .requests()?
            .iter()
            .any(|r| same_part(&r.parent_part, parent))
        {
            return Ok(RequestOutcome::AlreadyRequested);
        }
        let id = self.store.insert(
            Collection::BomRequests,
            store::fields([
                ("parentPart", json!(parent)),
                ("requestedBy", json!(actor)),
                ("requestedAt", json!(to_millis(now))),
            ]),
        )?;
        tracing::info!(parent, actor, "bom requested");
        Ok(RequestOutcome::Requested { id })
    }

    /// Drop a request. Approving and rejecting both close it; the items
    /// themselves are added separately.
    pub fn resolve_request(&self, id: &str) -> Result<BomRequest> {
        let request = self
            .requests()?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::DocumentNotFound {
                collection: Collection::BomRequests.to_string(),
                id: id.to_string(),
            })?;
        self.store.delete(Collection::BomRequests, &request.id)?;
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn expand_is_one_level_in_insertion_order() {
        let store = MemoryStore::new();
        let bom = Bom::new(&store);
        bom.add("KIT", "SCREW", 4.0).unwrap();
        bom.add("KIT", "PLATE", 0.5).unwrap();
        bom.add("PLATE", "RIVET", 10.0).unwrap();

        let lines = bom.expand("kit", 3.0).unwrap();
        assert_eq!(
            lines,
            vec![
                BomLine {
                    child_part: "SCREW".into(),
                    quantity: 12.0
                },
                BomLine {
                    child_part: "PLATE".into(),
                    quantity: 1.5
                },
            ]
        );
        assert!(bom.expand("NONE", 1.0).unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_edges() {
        let store = MemoryStore::new();
        let bom = Bom::new(&store);
        assert!(bom.add("A", "B", 0.0).is_err());
        assert!(bom.add("A", "B", -1.0).is_err());
        assert!(bom.add("A", "B", f64::NAN).is_err());
        assert!(bom.add("A", "a", 1.0).is_err());
        assert!(bom.items(None).unwrap().is_empty());
    }

    #[test]
    fn import_is_all_or_nothing() {
        let store = MemoryStore::new();
        let bom = Bom::new(&store);
        assert_eq!(bom.import(["A;B;2", "", "A;C;1,5"]).unwrap(), 2);
        assert_eq!(bom.items(Some("A")).unwrap()[1].quantity, 1.5);

        assert!(bom.import(["X;Y;1", "broken"]).is_err());
        assert!(bom.items(Some("X")).unwrap().is_empty());
    }

    #[test]
    fn requests_reject_known_and_pending_parents() {
        let store = MemoryStore::new();
        let bom = Bom::new(&store);
        bom.add("KIT", "SCREW", 1.0).unwrap();

        assert_eq!(
            bom.request("kit", "eva", now()).unwrap(),
            RequestOutcome::AlreadyExists
        );
        let RequestOutcome::Requested { id } = bom.request("NEW", "eva", now()).unwrap() else {
            panic!("expected a new request");
        };
        assert_eq!(
            bom.request("new", "jan", now()).unwrap(),
            RequestOutcome::AlreadyRequested
        );

        let resolved = bom.resolve_request(&id).unwrap();
        assert_eq!(resolved.parent_part, "NEW");
        assert!(bom.requests().unwrap().is_empty());
        assert!(bom.resolve_request(&id).is_err());
    }
}
