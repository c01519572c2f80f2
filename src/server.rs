//! Minimal JSON API over the box store.
//!
//! Requests are handled one at a time on the calling thread. Routing is a
//! plain function of method, URL and body so it can be exercised without a
//! socket.

use std::fs;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tiny_http::{Header, Response, Server};

use crate::categories::list_categories;
use crate::error::{AnnotatorError, Result};
use crate::geometry::BoxCoords;
use crate::store::{BoxStore, RecordId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl ApiResponse {
    fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self {
                status,
                content_type: "application/json",
                body,
            },
            Err(e) => Self::error(500, &format!("cannot encode response: {e}")),
        }
    }

    fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: json!({ "status": "error", "message": message })
                .to_string()
                .into_bytes(),
        }
    }
}

/// Body of `POST /api/object_data`.
#[derive(Debug, Deserialize)]
pub struct ObjectData {
    #[serde(default)]
    pub image_id: Option<String>,
    pub category: String,
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

#[derive(Debug, Serialize)]
struct Saved<'a> {
    status: &'static str,
    message: &'static str,
    id: RecordId,
    image_id: &'a str,
}

pub struct Api {
    store: BoxStore,
    image_root: PathBuf,
}

impl Api {
    pub fn new(store: BoxStore, image_root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            image_root: image_root.into(),
        }
    }

    pub fn handle(&self, method: &str, url: &str, body: &str) -> ApiResponse {
        let (path, query) = url.split_once('?').unwrap_or((url, ""));
        debug!("{method} {path}");
        match (method, path) {
            ("GET", "/api/categories") => self.categories(),
            ("GET", "/api/object_data") => self.list_objects(query),
            ("POST", "/api/object_data") => self.save_object(body),
            ("GET", p) if p.starts_with("/img/") => self.image(&p["/img/".len()..]),
            _ => ApiResponse::error(404, "not found"),
        }
    }

    fn categories(&self) -> ApiResponse {
        match list_categories(&self.image_root) {
            Ok(categories) => ApiResponse::json(200, &categories),
            Err(e) => ApiResponse::error(500, &e.to_string()),
        }
    }

    fn list_objects(&self, query: &str) -> ApiResponse {
        let category = query_param(query, "category");
        let records = match &category {
            Some(category) => self.store.list(category),
            None => self.store.list_all(),
        };
        match records {
            Ok(records) => ApiResponse::json(200, &records),
            Err(e) => ApiResponse::error(500, &e.to_string()),
        }
    }

    fn save_object(&self, body: &str) -> ApiResponse {
        let data: ObjectData = match serde_json::from_str(body) {
            Ok(data) => data,
            Err(e) => return ApiResponse::error(400, &format!("invalid object data: {e}")),
        };
        if data.category.trim().is_empty() {
            return ApiResponse::error(400, "category must not be empty");
        }
        let image_id = data
            .image_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(generate_image_id);
        let coords = BoxCoords::from_corners(data.x1, data.y1, data.x2, data.y2);

        match self.store.upsert(&image_id, &data.category, coords) {
            Ok(id) => {
                info!("saved box #{id} for {}/{image_id}", data.category);
                ApiResponse::json(
                    200,
                    &Saved {
                        status: "ok",
                        message: "data saved",
                        id,
                        image_id: &image_id,
                    },
                )
            }
            Err(e) => ApiResponse::error(500, &e.to_string()),
        }
    }

    fn image(&self, rest: &str) -> ApiResponse {
        let Some((category, file)) = rest.split_once('/') else {
            return ApiResponse::error(400, "expected /img/<category>/<file>");
        };
        let (category, file) = (percent_decode(category), percent_decode(file));
        if !is_plain_segment(&category) || !is_plain_segment(&file) {
            return ApiResponse::error(400, "invalid path");
        }

        let path = self.image_root.join(&category).join(&file);
        match fs::read(&path) {
            Ok(body) => ApiResponse {
                status: 200,
                content_type: content_type_for(&path),
                body,
            },
            Err(e) if e.kind() == ErrorKind::NotFound => ApiResponse::error(404, "image not found"),
            Err(e) => {
                warn!("cannot read {}: {e}", path.display());
                ApiResponse::error(500, "cannot read image")
            }
        }
    }
}

fn generate_image_id() -> String {
    format!("obj-{:016x}", rand::random::<u64>())
}

fn is_plain_segment(s: &str) -> bool {
    !s.is_empty() && s != "." && s != ".." && !s.contains(['/', '\\'])
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}

fn query_param(query: &str, key: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| percent_decode(v))
}

/// Decodes `%XX` escapes and `+` as space. Malformed escapes are kept verbatim.
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|h| u8::from_str_radix(h, 16).ok());
                match hex {
                    Some(b) => {
                        out.push(b);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Serves `api` on `addr` until the process is stopped.
pub fn serve(api: &Api, addr: &str) -> Result<()> {
    let server = Server::http(addr).map_err(|e| AnnotatorError::Bind {
        addr: addr.to_string(),
        message: e.to_string(),
    })?;
    info!("listening on http://{addr}");

    for mut request in server.incoming_requests() {
        let method = request.method().to_string();
        let url = request.url().to_string();
        let mut body = String::new();
        let reply = match request.as_reader().read_to_string(&mut body) {
            Ok(_) => api.handle(&method, &url, &body),
            Err(e) => ApiResponse::error(400, &format!("cannot read body: {e}")),
        };
        debug!("{method} {url} -> {}", reply.status);

        let mut response = Response::from_data(reply.body).with_status_code(reply.status);
        if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], reply.content_type.as_bytes()) {
            response = response.with_header(header);
        }
        if let Err(e) = request.respond(response) {
            warn!("failed to send response for {url}: {e}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tempfile::{TempDir, tempdir};

    fn api() -> (TempDir, Api) {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("dogs")).unwrap();
        fs::create_dir_all(dir.path().join("cats")).unwrap();
        fs::write(dir.path().join("cats/tom.png"), b"\x89PNG fake").unwrap();
        let api = Api::new(BoxStore::open_in_memory().unwrap(), dir.path());
        (dir, api)
    }

    fn body_json(resp: &ApiResponse) -> Value {
        serde_json::from_slice(&resp.body).unwrap()
    }

    #[test]
    fn categories_are_listed() {
        let (_dir, api) = api();
        let resp = api.handle("GET", "/api/categories", "");
        assert_eq!(resp.status, 200);
        assert_eq!(body_json(&resp), serde_json::json!(["cats", "dogs"]));
    }

    #[test]
    fn posting_the_same_image_twice_upserts() {
        let (_dir, api) = api();
        let body = r#"{"image_id": "tom", "category": "cats", "x1": 50, "y1": 40, "x2": 10, "y2": 5}"#;
        let first = body_json(&api.handle("POST", "/api/object_data", body));
        let body = r#"{"image_id": "tom", "category": "cats", "x1": 1, "y1": 2, "x2": 30, "y2": 40}"#;
        let second = body_json(&api.handle("POST", "/api/object_data", body));

        assert_eq!(first["status"], "ok");
        assert_eq!(first["id"], second["id"]);

        let listed = body_json(&api.handle("GET", "/api/object_data?category=cats", ""));
        assert_eq!(
            listed,
            serde_json::json!([{"id": first["id"], "image_id": "tom", "category": "cats", "x1": 1, "y1": 2, "x2": 30, "y2": 40}])
        );
    }

    #[test]
    fn listing_without_a_category_returns_every_box() {
        let (_dir, api) = api();
        let cat = r#"{"image_id": "tom", "category": "cats", "x1": 1, "y1": 2, "x2": 30, "y2": 40}"#;
        let dog = r#"{"image_id": "rex", "category": "dogs", "x1": 5, "y1": 6, "x2": 70, "y2": 80}"#;
        assert_eq!(api.handle("POST", "/api/object_data", cat).status, 200);
        assert_eq!(api.handle("POST", "/api/object_data", dog).status, 200);

        let resp = api.handle("GET", "/api/object_data", "");
        assert_eq!(resp.status, 200);
        let listed = body_json(&resp);
        let mut pairs: Vec<(String, String)> = listed
            .as_array()
            .unwrap()
            .iter()
            .map(|r| {
                (
                    r["category"].as_str().unwrap().to_owned(),
                    r["image_id"].as_str().unwrap().to_owned(),
                )
            })
            .collect();
        pairs.sort();
        assert_eq!(
            pairs,
            [
                ("cats".to_owned(), "tom".to_owned()),
                ("dogs".to_owned(), "rex".to_owned())
            ]
        );

        let dogs = body_json(&api.handle("GET", "/api/object_data?category=dogs", ""));
        assert_eq!(dogs.as_array().unwrap().len(), 1);
    }

    #[test]
    fn missing_image_id_is_generated() {
        let (_dir, api) = api();
        let body = r#"{"category": "dogs", "x1": 0, "y1": 0, "x2": 10, "y2": 10}"#;
        let resp = body_json(&api.handle("POST", "/api/object_data", body));
        let image_id = resp["image_id"].as_str().unwrap();
        assert!(image_id.starts_with("obj-"));
        assert_eq!(image_id.len(), "obj-".len() + 16);
    }

    #[test]
    fn bad_bodies_are_rejected() {
        let (_dir, api) = api();
        assert_eq!(api.handle("POST", "/api/object_data", "not json").status, 400);
        let blank = r#"{"category": " ", "x1": 0, "y1": 0, "x2": 10, "y2": 10}"#;
        assert_eq!(api.handle("POST", "/api/object_data", blank).status, 400);
    }

    #[test]
    fn images_are_served_with_a_content_type() {
        let (_dir, api) = api();
        let resp = api.handle("GET", "/img/cats/tom.png", "");
        assert_eq!(resp.status, 200);
        assert_eq!(resp.content_type, "image/png");
        assert_eq!(resp.body, b"\x89PNG fake");

        assert_eq!(api.handle("GET", "/img/cats/nope.png", "").status, 404);
    }

    #[test]
    fn path_traversal_is_refused() {
        let (_dir, api) = api();
        assert_eq!(api.handle("GET", "/img/../secret", "").status, 400);
        assert_eq!(api.handle("GET", "/img/cats/%2e%2e", "").status, 400);
        assert_eq!(api.handle("GET", "/img/cats/a%2Fb.png", "").status, 400);
    }

    #[test]
    fn unknown_routes_are_not_found() {
        let (_dir, api) = api();
        assert_eq!(api.handle("DELETE", "/api/categories", "").status, 404);
        assert_eq!(api.handle("GET", "/", "").status, 404);
    }

    #[test]
    fn percent_decoding() {
        assert_eq!(percent_decode("red%20cars+x"), "red cars x");
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
    }
}
