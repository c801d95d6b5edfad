//! In-memory stand-in for the ArangoDB endpoints the session uses

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::transport::Transport;
use crate::{ClientError, Result};

#[derive(Default)]
struct FakeCollection {
    kind: u8,
    documents: BTreeMap<u64, Value>,
}

struct FakeCursor {
    remaining: Vec<Value>,
    batch_size: usize,
}

#[derive(Default)]
struct FakeState {
    databases: BTreeMap<String, BTreeMap<String, FakeCollection>>,
    users: HashMap<String, String>,
    cursors: HashMap<String, FakeCursor>,
    requests: Vec<(Method, String)>,
    failures: Vec<(Method, String)>,
    query_error_flag: bool,
    jwt: Option<String>,
    next_id: u64,
}

type Reply = Result<(u16, Value)>;

fn arango_error(status: u16, error_num: i64, message: &str) -> ClientError {
    ClientError::Server {
        status,
        error_num: Some(error_num),
        message: message.to_string(),
    }
}

impl FakeState {
    fn handle(&mut self, method: &Method, path: &str, body: Option<Value>) -> Reply {
        self.requests.push((method.clone(), path.to_string()));

        if self
            .failures
            .iter()
            .any(|(m, prefix)| m == method && path.starts_with(prefix.as_str()))
        {
            return Err(arango_error(503, 503, "service unavailable"));
        }

        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        match (method.as_str(), segments.as_slice()) {
            ("POST", ["_open", "auth"]) => self.auth(body),
            ("GET", ["_api", "database"]) => {
                let names: Vec<&String> = self.databases.keys().collect();
                Ok((200, json!({ "result": names })))
            }
            ("POST", ["_api", "database"]) => {
                let name = field(&body, "name")?;
                if self.databases.contains_key(&name) {
                    return Err(arango_error(409, 1207, "duplicate database name"));
                }
                self.databases.insert(name, BTreeMap::new());
                Ok((201, json!({ "result": true })))
            }
            ("DELETE", ["_api", "database", name]) => match self.databases.remove(*name) {
                Some(_) => Ok((200, json!({ "result": true }))),
                None => Err(arango_error(404, 1228, "database not found")),
            },
            (_, ["_db", db, "_api", rest @ ..]) => {
                if !self.databases.contains_key(*db) {
                    return Err(arango_error(404, 1228, "database not found"));
                }
                self.handle_db(method, db, rest, body)
            }
            _ => Err(arango_error(404, 404, "unknown path")),
        }
    }

    fn auth(&mut self, body: Option<Value>) -> Reply {
        let username = field(&body, "username")?;
        let password = field(&body, "password")?;
        if self.users.get(&username) != Some(&password) {
            return Err(arango_error(401, 401, "Wrong credentials"));
        }
        Ok((200, json!({ "jwt": format!("jwt-{}", username) })))
    }

    fn handle_db(&mut self, method: &Method, db: &str, rest: &[&str], body: Option<Value>) -> Reply {
        match (method.as_str(), rest) {
            ("GET", ["collection"]) => {
                let list: Vec<Value> = self.databases[db]
                    .iter()
                    .map(|(name, c)| {
                        json!({
                            "id": name,
                            "name": name,
                            "type": c.kind,
                            "isSystem": name.starts_with('_')
                        })
                    })
                    .collect();
                Ok((200, json!({ "result": list })))
            }
            ("POST", ["collection"]) => {
                let name = field(&body, "name")?;
                let kind = body
                    .as_ref()
                    .and_then(|b| b.get("type"))
                    .and_then(Value::as_u64)
                    .unwrap_or(2) as u8;
                let collections = self.collections(db);
                if collections.contains_key(&name) {
                    return Err(arango_error(409, 1207, "duplicate name"));
                }
                collections.insert(
                    name.clone(),
                    FakeCollection {
                        kind,
                        ..Default::default()
                    },
                );
                Ok((200, json!({ "name": name, "type": kind })))
            }
            ("DELETE", ["collection", name]) => match self.collections(db).remove(*name) {
                Some(_) => Ok((200, json!({ "error": false }))),
                None => Err(collection_not_found()),
            },
            ("PUT", ["collection", name, "truncate"]) => {
                self.collection(db, name)?.documents.clear();
                Ok((200, json!({ "error": false })))
            }
            ("POST", ["document", collection]) => self.insert(db, collection, body),
            ("GET", ["document", collection, key]) => {
                let key = parse_key(key)?;
                self.collection(db, collection)?
                    .documents
                    .get(&key)
                    .cloned()
                    .map(|doc| (200, doc))
                    .ok_or_else(document_not_found)
            }
            ("PATCH", ["document", collection, key]) => {
                let key = parse_key(key)?;
                let patch = match body {
                    Some(Value::Object(map)) => map,
                    _ => return Err(arango_error(400, 600, "invalid patch body")),
                };
                let doc = self
                    .collection(db, collection)?
                    .documents
                    .get_mut(&key)
                    .ok_or_else(document_not_found)?;
                if let Value::Object(stored) = &mut *doc {
                    for (k, v) in patch {
                        if !k.starts_with('_') {
                            stored.insert(k, v);
                        }
                    }
                }
                Ok((202, doc_id(doc)))
            }
            ("POST", ["cursor"]) => self.open_cursor(db, body),
            ("PUT", ["cursor", id]) => self.read_cursor(id),
            _ => Err(arango_error(404, 404, "unknown path")),
        }
    }

    fn collections(&mut self, db: &str) -> &mut BTreeMap<String, FakeCollection> {
        self.databases.entry(db.to_string()).or_default()
    }

    fn collection(&mut self, db: &str, name: &str) -> Result<&mut FakeCollection> {
        self.collections(db)
            .get_mut(name)
            .ok_or_else(collection_not_found)
    }

    fn insert(&mut self, db: &str, collection: &str, body: Option<Value>) -> Reply {
        let mut doc = match body {
            Some(Value::Object(map)) => map,
            _ => return Err(arango_error(400, 600, "invalid document body")),
        };
        self.next_id += 1;
        let key = self.next_id;
        let coll = self.collection(db, collection)?;
        doc.insert("_id".into(), json!(format!("{}/{}", collection, key)));
        doc.insert("_key".into(), json!(key.to_string()));
        doc.insert("_rev".into(), json!(format!("_rev{}", key)));
        let doc = Value::Object(doc);
        let id = doc_id(&doc);
        coll.documents.insert(key, doc);
        Ok((202, id))
    }

    fn open_cursor(&mut self, db: &str, body: Option<Value>) -> Reply {
        if self.query_error_flag {
            return Ok((
                201,
                json!({ "error": true, "code": 400, "errorNum": 1501, "errorMessage": "syntax error" }),
            ));
        }

        let body = body.unwrap_or(Value::Null);
        let query = body.get("query").and_then(Value::as_str).unwrap_or("");
        let bind_vars = body
            .get("bindVars")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let collection = target_collection(query, &bind_vars)
            .ok_or_else(|| arango_error(400, 1501, "cannot find collection in query"))?;

        let matches: Vec<Value> = self
            .collection(db, &collection)?
            .documents
            .values()
            .filter(|doc| {
                bind_vars
                    .iter()
                    .filter(|(k, _)| !k.starts_with('@'))
                    .all(|(k, v)| doc.get(k) == Some(v))
            })
            .cloned()
            .collect();

        let total = matches.len();
        let batch_size = body
            .get("batchSize")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(total.max(1));

        self.next_id += 1;
        let cursor_id = format!("cursor{}", self.next_id);
        let mut reply = self.batch(
            cursor_id,
            FakeCursor {
                remaining: matches,
                batch_size,
            },
        );
        if body.get("count").and_then(Value::as_bool) == Some(true) {
            reply["count"] = json!(total);
        }
        Ok((201, reply))
    }

    fn read_cursor(&mut self, id: &str) -> Reply {
        let cursor = self
            .cursors
            .remove(id)
            .ok_or_else(|| arango_error(404, 1600, "cursor not found"))?;
        Ok((200, self.batch(id.to_string(), cursor)))
    }

    fn batch(&mut self, id: String, mut cursor: FakeCursor) -> Value {
        let take = cursor.batch_size.min(cursor.remaining.len());
        let result: Vec<Value> = cursor.remaining.drain(..take).collect();
        let has_more = !cursor.remaining.is_empty();

        let mut reply = json!({
            "error": false,
            "code": 201,
            "result": result,
            "hasMore": has_more,
        });
        if has_more {
            reply["id"] = json!(id);
            self.cursors.insert(id, cursor);
        }
        reply
    }
}

/// Collection a query reads from: the `@@` bind parameter, else the word after `IN`
fn target_collection(query: &str, bind_vars: &Map<String, Value>) -> Option<String> {
    let mut words = query.split_whitespace();
    words.find(|w| *w == "IN")?;
    let word = words.next()?;

    match word.strip_prefix("@@") {
        Some(param) => bind_vars
            .get(&format!("@{}", param))
            .and_then(Value::as_str)
            .map(str::to_string),
        None => Some(word.to_string()),
    }
}

fn field(body: &Option<Value>, name: &str) -> Result<String> {
    body.as_ref()
        .and_then(|b| b.get(name))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| arango_error(400, 600, "missing field"))
}

fn parse_key(key: &str) -> Result<u64> {
    key.parse().map_err(|_| document_not_found())
}

fn doc_id(doc: &Value) -> Value {
    json!({ "_id": doc["_id"], "_key": doc["_key"], "_rev": doc["_rev"] })
}

fn collection_not_found() -> ClientError {
    arango_error(404, 1203, "collection or view not found")
}

fn document_not_found() -> ClientError {
    arango_error(404, 1202, "document not found")
}

/// Transport half, handed to a `Session`
pub struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
}

/// Inspection half, kept by the test
#[derive(Clone)]
pub struct FakeStore {
    state: Arc<Mutex<FakeState>>,
}

impl FakeTransport {
    /// A fake server holding only the `_system` database
    pub fn new() -> (FakeTransport, FakeStore) {
        let mut state = FakeState::default();
        state.databases.insert("_system".to_string(), BTreeMap::new());
        let state = Arc::new(Mutex::new(state));
        (
            FakeTransport {
                state: state.clone(),
            },
            FakeStore { state },
        )
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn query(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let (_, value) = self.lock().handle(&method, path, body.cloned())?;
        Ok(value)
    }

    async fn delete(&self, path: &str) -> Result<u16> {
        let (status, _) = self.lock().handle(&Method::DELETE, path, None)?;
        Ok(status)
    }

    async fn put(&self, path: &str, body: Option<&Value>) -> Result<u16> {
        let (status, _) = self.lock().handle(&Method::PUT, path, body.cloned())?;
        Ok(status)
    }

    async fn patch(&self, path: &str, body: &Value) -> Result<u16> {
        let (status, _) = self
            .lock()
            .handle(&Method::PATCH, path, Some(body.clone()))?;
        Ok(status)
    }

    async fn patch_raw(&self, path: &str, raw: Vec<u8>) -> Result<u16> {
        let body: Value = serde_json::from_slice(&raw)?;
        self.patch(path, &body).await
    }

    fn set_jwt(&mut self, token: String) {
        self.lock().jwt = Some(token);
    }
}

impl FakeStore {
    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn add_user(&self, username: &str, password: &str) {
        self.lock()
            .users
            .insert(username.to_string(), password.to_string());
    }

    pub fn jwt(&self) -> Option<String> {
        self.lock().jwt.clone()
    }

    /// Make every request matching `method` and `path_prefix` fail with 503
    pub fn fail(&self, method: Method, path_prefix: &str) {
        self.lock().failures.push((method, path_prefix.to_string()));
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Answer every query with `error: true` and a 2xx status
    pub fn flag_query_errors(&self, enabled: bool) {
        self.lock().query_error_flag = enabled;
    }

    pub fn create_collection(&self, db: &str, name: &str) {
        self.lock()
            .collections(db)
            .entry(name.to_string())
            .or_insert_with(|| FakeCollection {
                kind: 2,
                ..Default::default()
            });
    }

    /// Seed a document directly, returning its `_id`
    pub fn insert(&self, db: &str, collection: &str, doc: Value) -> String {
        self.create_collection(db, collection);
        let (_, id) = self
            .lock()
            .insert(db, collection, Some(doc))
            .unwrap();
        id["_id"].as_str().unwrap().to_string()
    }

    pub fn documents(&self, db: &str, collection: &str) -> Vec<Value> {
        self.lock()
            .databases
            .get(db)
            .and_then(|c| c.get(collection))
            .map(|c| c.documents.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn requests(&self) -> Vec<(Method, String)> {
        self.lock().requests.clone()
    }

    pub fn count_requests(&self, method: Method, path_prefix: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|(m, p)| *m == method && p.starts_with(path_prefix))
            .count()
    }
}
