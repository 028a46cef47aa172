use std::io::{Read, Write};
use std::time::Duration;
use chrono::{DateTime, Utc};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use crate::config_loader::{load_app_settings, AuthMode, BoxAppSettings};
use crate::driver::ClientSettings;
use crate::error::{Error, Result};
use crate::vfs::path::{components, join, split_parent};
use crate::vfs::{EntryInfo, EntryKind, FileWriter, VfsClient};

const AUTH_URL: &str = "https://api.box.com/oauth2/token";
const API_URL: &str = "https://api.box.com/2.0";
const UPLOAD_URL: &str = "https://upload.box.com/api/2.0";
const ROOT_FOLDER_ID: &str = "0";
const ITEM_FIELDS: &str = "id,type,name,size,modified_at";
const PAGE_LIMIT: usize = 1000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
    token_type: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseItem {
    #[serde(rename = "type")]
    item_type: String,
    id: String,
    name: String,
    size: Option<u64>,
    modified_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseList {
    entries: Vec<ResponseItem>,
    total_count: Option<usize>,
}

impl ResponseItem {
    fn root(id: &str) -> Self {
        ResponseItem {
            item_type: "folder".to_owned(),
            id: id.to_owned(),
            name: String::new(),
            size: None,
            modified_at: None,
        }
    }

    fn is_folder(&self) -> bool {
        self.item_type == "folder"
    }

    /// Web links and other item types have no filesystem meaning.
    fn into_entry(self, path: String) -> Option<EntryInfo> {
        let kind = match self.item_type.as_str() {
            "file" => EntryKind::File,
            "folder" => EntryKind::Dir,
            _ => return None,
        };
        let modified = self.modified_at.as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|time| time.with_timezone(&Utc));
        Some(EntryInfo {
            name: self.name,
            path,
            kind,
            size: self.size.unwrap_or(0),
            modified,
            id: Some(self.id),
        })
    }
}

/// Form fields of the token request for the configured grant.
/// Returns `None` for developer tokens, which need no exchange.
fn token_request_form(
    settings: &ClientSettings,
    app: &BoxAppSettings,
) -> Result<Option<Vec<(&'static str, String)>>> {
    let mut form = vec![
        ("client_id", app.app.client_id.clone()),
        ("client_secret", app.app.client_secret.clone()),
    ];
    match settings.auth_mode {
        AuthMode::DeveloperToken => return Ok(None),
        AuthMode::OAuth => {
            let refresh_token = app.refresh_token.clone()
                .filter(|token| !token.is_empty())
                .ok_or_else(|| Error::authentication("oauth mode needs a 'refreshToken' in the Box settings"))?;
            form.push(("grant_type", "refresh_token".to_owned()));
            form.push(("refresh_token", refresh_token));
        }
        AuthMode::Ccg => {
            form.push(("grant_type", "client_credentials".to_owned()));
            let user = settings.user_id.clone().filter(|id| !id.is_empty());
            match user {
                Some(user_id) if !settings.use_service_account => {
                    form.push(("box_subject_type", "user".to_owned()));
                    form.push(("box_subject_id", user_id));
                }
                _ => {
                    let enterprise_id = app.enterprise_id.clone()
                        .filter(|id| !id.is_empty())
                        .ok_or_else(|| Error::authentication(
                            "service account access needs an 'enterpriseID' in the Box settings"
                        ))?;
                    form.push(("box_subject_type", "enterprise".to_owned()));
                    form.push(("box_subject_id", enterprise_id));
                }
            }
        }
    }
    Ok(Some(form))
}

fn fetch_access_token(http: &Client, form: &[(&'static str, String)]) -> Result<String> {
    let res = http.post(AUTH_URL).form(form).send()?;
    let status = res.status();
    if !status.is_success() {
        let reason = res.json::<TokenErrorResponse>().ok()
            .and_then(|body| body.error_description.or(body.error))
            .unwrap_or_else(|| status.to_string());
        return Err(Error::authentication(format!("Box token request failed: {}", reason)));
    }
    let body = res.json::<AccessTokenResponse>()
        .map_err(|e| Error::authentication(format!("unreadable Box token response: {}", e)))?;
    debug!("obtained {} token valid for {:?}s", body.token_type.as_deref().unwrap_or("bearer"), body.expires_in);
    Ok(body.access_token)
}

fn status_error(status: u16, context: &str, message: String) -> Error {
    match status {
        401 | 403 => Error::authentication(format!("{}: {}", context, message)),
        404 => Error::NotFound(context.to_owned()),
        409 => Error::AlreadyExists(context.to_owned()),
        _ => Error::Api { status, message: format!("{}: {}", context, message) },
    }
}

fn check(res: Response, context: &str) -> Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let message = res.json::<ApiErrorResponse>().ok()
        .and_then(|body| match (body.code, body.message) {
            (Some(code), Some(message)) => Some(format!("{} ({})", message, code)),
            (code, message) => message.or(code),
        })
        .unwrap_or_else(|| status.to_string());
    Err(status_error(status.as_u16(), context, message))
}

/// Authenticated HTTP handle, cheap to clone.
#[derive(Clone)]
struct Session {
    http: Client,
    token: String,
}

impl Session {
    fn get(&self, url: String) -> RequestBuilder {
        self.http.get(url).bearer_auth(&self.token)
    }

    fn post(&self, url: String) -> RequestBuilder {
        self.http.post(url).bearer_auth(&self.token)
    }

    fn delete(&self, url: String) -> RequestBuilder {
        self.http.delete(url).bearer_auth(&self.token)
    }
}

/// Folder listing and creation, the only calls the path walk needs.
trait FolderApi {
    fn fetch_items(&self, folder_id: &str, offset: usize, limit: usize, context: &str) -> Result<ResponseList>;

    fn create_folder(&self, parent_id: &str, name: &str, context: &str) -> Result<String>;
}

/// Pages through a folder. Without `total_count`, a short page ends the listing.
fn list_all<A: FolderApi + ?Sized>(api: &A, folder_id: &str, limit: usize, context: &str) -> Result<Vec<ResponseItem>> {
    let mut items = Vec::new();
    loop {
        let page = api.fetch_items(folder_id, items.len(), limit, context)?;
        let fetched = page.entries.len();
        items.extend(page.entries);
        let done = match page.total_count {
            Some(total) => items.len() >= total,
            None => fetched < limit,
        };
        if fetched == 0 || done {
            return Ok(items);
        }
    }
}

fn find_child<A: FolderApi + ?Sized>(api: &A, folder_id: &str, name: &str, context: &str) -> Result<Option<ResponseItem>> {
    Ok(list_all(api, folder_id, PAGE_LIMIT, context)?
        .into_iter()
        .find(|item| item.name == name))
}

/// Walks from `root_id` through `root_path` down to `path`, one listing per component.
fn resolve_item<A: FolderApi + ?Sized>(api: &A, root_id: &str, root_path: &str, path: &str) -> Result<ResponseItem> {
    let full = join(root_path.trim_matches('/'), path.trim_matches('/'));
    let mut current = ResponseItem::root(root_id);
    for part in components(&full) {
        if !current.is_folder() {
            return Err(Error::NotADirectory(path.to_owned()));
        }
        current = find_child(api, &current.id, part, path)?
            .ok_or_else(|| Error::NotFound(path.to_owned()))?;
    }
    Ok(current)
}

/// Ensures every folder of `parts` exists below `start_id` and returns the id
/// of the last one. A folder created concurrently (HTTP 409) is looked up
/// again; only the final component honours `exist_ok`.
fn ensure_folders<A: FolderApi + ?Sized>(
    api: &A,
    start_id: &str,
    parts: &[&str],
    create_parents: bool,
    exist_ok: bool,
) -> Result<String> {
    let mut folder_id = start_id.to_owned();
    let mut current = String::new();
    for (index, part) in parts.iter().enumerate() {
        let last = index + 1 == parts.len();
        current = join(&current, part);
        let existing = match find_child(api, &folder_id, part, &current)? {
            Some(item) => Some(item),
            None if last || create_parents => match api.create_folder(&folder_id, part, &current) {
                Ok(id) => {
                    folder_id = id;
                    continue;
                }
                Err(Error::AlreadyExists(_)) => find_child(api, &folder_id, part, &current)?,
                Err(e) => return Err(e),
            },
            None => return Err(Error::NotFound(current)),
        };
        match existing {
            Some(item) if item.is_folder() => {
                if last && !exist_ok {
                    return Err(Error::AlreadyExists(current));
                }
                folder_id = item.id;
            }
            Some(_) if last => return Err(Error::AlreadyExists(current)),
            Some(_) => return Err(Error::NotADirectory(current)),
            None => return Err(Error::NotFound(current)),
        }
    }
    Ok(folder_id)
}

/// `create_parents` also creates a missing `root_path`.
fn make_dirs<A: FolderApi + ?Sized>(
    api: &A,
    root_id: &str,
    root_path: &str,
    path: &str,
    create_parents: bool,
    exist_ok: bool,
) -> Result<()> {
    let parts: Vec<&str> = components(root_path).chain(components(path)).collect();
    if parts.is_empty() {
        return if exist_ok { Ok(()) } else { Err(Error::AlreadyExists(path.to_owned())) };
    }
    ensure_folders(api, root_id, &parts, create_parents, exist_ok)?;
    Ok(())
}

/// Box REST client rooted at one folder.
pub struct BoxDriver {
    session: Session,
    root_id: String,
    root_path: String,
}

impl BoxDriver {
    /// Loads the app settings and obtains an access token. Nothing is
    /// requested from the file API until the first operation.
    pub fn new(settings: &ClientSettings) -> Result<Self> {
        let app = load_app_settings(&settings.credentials)?;
        if app.app.app_auth.as_ref().and_then(|auth| auth.public_key_id.as_ref()).is_some() {
            debug!("Box settings carry a JWT key pair, requesting the token with {:?}", settings.auth_mode);
        }
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let token = match token_request_form(settings, &app)? {
            None => app.developer_token.clone()
                .filter(|token| !token.is_empty())
                .ok_or_else(|| Error::authentication("developer_token mode needs a 'developerToken' in the Box settings"))?,
            Some(form) => fetch_access_token(&http, &form)?,
        };
        let driver = BoxDriver {
            session: Session { http, token },
            root_id: settings.root_id.clone().unwrap_or_else(|| ROOT_FOLDER_ID.to_owned()),
            root_path: settings.root_path.clone().unwrap_or_default(),
        };
        info!("Box client ready, root folder {} path '{}'", driver.root_id, driver.root_path);
        Ok(driver)
    }

    fn resolve(&self, path: &str) -> Result<ResponseItem> {
        resolve_item(self, &self.root_id, &self.root_path, path)
    }

    fn resolve_folder(&self, path: &str) -> Result<String> {
        let item = self.resolve(path)?;
        if !item.is_folder() {
            return Err(Error::NotADirectory(path.to_owned()));
        }
        Ok(item.id)
    }
}

impl FolderApi for BoxDriver {
    fn fetch_items(&self, folder_id: &str, offset: usize, limit: usize, context: &str) -> Result<ResponseList> {
        let res = self.session.get(format!("{}/folders/{}/items", API_URL, folder_id))
            .query(&[
                ("fields", ITEM_FIELDS.to_owned()),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ])
            .send()?;
        Ok(check(res, context)?.json::<ResponseList>()?)
    }

    fn create_folder(&self, parent_id: &str, name: &str, context: &str) -> Result<String> {
        let res = self.session.post(format!("{}/folders", API_URL))
            .json(&json!({ "name": name, "parent": { "id": parent_id } }))
            .send()?;
        let created = check(res, context)?.json::<ResponseItem>()?;
        debug!("created folder {} ({})", context, created.id);
        Ok(created.id)
    }
}

struct BoxUploadWriter {
    session: Session,
    parent_id: String,
    name: String,
    existing_id: Option<String>,
    path: String,
    buffer: Vec<u8>,
}

impl Write for BoxUploadWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl FileWriter for BoxUploadWriter {
    fn close(self: Box<Self>) -> Result<()> {
        let BoxUploadWriter { session, parent_id, name, existing_id, path, buffer } = *self;
        let size = buffer.len();
        let attributes = json!({ "name": name, "parent": { "id": parent_id } });
        let form = Form::new()
            .text("attributes", attributes.to_string())
            .part("file", Part::bytes(buffer).file_name(name));
        let url = match &existing_id {
            Some(id) => format!("{}/files/{}/content", UPLOAD_URL, id),
            None => format!("{}/files/content", UPLOAD_URL),
        };
        let res = session.post(url).multipart(form).send()?;
        check(res, &path)?;
        debug!("uploaded {} bytes to {}", size, path);
        Ok(())
    }
}

impl VfsClient for BoxDriver {
    fn open_read(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        let item = self.resolve(path)?;
        if item.is_folder() {
            return Err(Error::IsADirectory(path.to_owned()));
        }
        let res = self.session.get(format!("{}/files/{}/content", API_URL, item.id)).send()?;
        Ok(Box::new(check(res, path)?))
    }

    fn open_write(&self, path: &str) -> Result<Box<dyn FileWriter>> {
        let (parent, name) = split_parent(path);
        if name.is_empty() {
            return Err(Error::IsADirectory(path.to_owned()));
        }
        let parent_id = self.resolve_folder(parent)?;
        let existing_id = match find_child(self, &parent_id, name, path)? {
            Some(item) if item.is_folder() => return Err(Error::IsADirectory(path.to_owned())),
            Some(item) => Some(item.id),
            None => None,
        };
        Ok(Box::new(BoxUploadWriter {
            session: self.session.clone(),
            parent_id,
            name: name.to_owned(),
            existing_id,
            path: path.to_owned(),
            buffer: Vec::new(),
        }))
    }

    fn list(&self, path: &str) -> Result<Vec<EntryInfo>> {
        let folder_id = self.resolve_folder(path)?;
        let base = path.trim_matches('/');
        Ok(list_all(self, &folder_id, PAGE_LIMIT, path)?
            .into_iter()
            .filter_map(|item| {
                let child = join(base, &item.name);
                item.into_entry(child)
            })
            .collect())
    }

    fn info(&self, path: &str) -> Result<EntryInfo> {
        let item = self.resolve(path)?;
        item.into_entry(path.trim_matches('/').to_owned())
            .ok_or_else(|| Error::NotFound(path.to_owned()))
    }

    fn mkdir(&self, path: &str, create_parents: bool, exist_ok: bool) -> Result<()> {
        make_dirs(self, &self.root_id, &self.root_path, path, create_parents, exist_ok)
    }

    fn remove(&self, path: &str, recursive: bool) -> Result<()> {
        if components(path).next().is_none() {
            return Err(Error::InvalidPath("refusing to remove the root".to_owned()));
        }
        let item = self.resolve(path)?;
        let request = if item.is_folder() {
            self.session.delete(format!("{}/folders/{}", API_URL, item.id))
                .query(&[("recursive", recursive.to_string())])
        } else {
            self.session.delete(format!("{}/files/{}", API_URL, item.id))
        };
        check(request.send()?, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use crate::config_loader::CredentialsSource;

    fn app_settings(json: &str) -> BoxAppSettings {
        serde_json::from_str(json).unwrap()
    }

    fn settings(auth_mode: AuthMode, credentials: &str) -> ClientSettings {
        ClientSettings {
            credentials: CredentialsSource::Inline(credentials.to_owned()),
            auth_mode,
            user_id: None,
            use_service_account: false,
            root_id: Some("12345".to_owned()),
            root_path: None,
        }
    }

    const APP: &str = r#"{
        "boxAppSettings": { "clientID": "id", "clientSecret": "secret" },
        "enterpriseID": "42",
        "refreshToken": "refresh"
    }"#;

    fn field<'a>(form: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        form.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_ccg_form_targets_user_or_enterprise() {
        let app = app_settings(APP);
        let mut client_settings = settings(AuthMode::Ccg, APP);

        let form = token_request_form(&client_settings, &app).unwrap().unwrap();
        assert_eq!(field(&form, "grant_type"), Some("client_credentials"));
        assert_eq!(field(&form, "box_subject_type"), Some("enterprise"));
        assert_eq!(field(&form, "box_subject_id"), Some("42"));

        client_settings.user_id = Some("7".to_owned());
        let form = token_request_form(&client_settings, &app).unwrap().unwrap();
        assert_eq!(field(&form, "box_subject_type"), Some("user"));
        assert_eq!(field(&form, "box_subject_id"), Some("7"));

        client_settings.use_service_account = true;
        let form = token_request_form(&client_settings, &app).unwrap().unwrap();
        assert_eq!(field(&form, "box_subject_type"), Some("enterprise"));
    }

    #[test]
    fn test_ccg_without_enterprise_fails() {
        let app = app_settings(r#"{ "boxAppSettings": { "clientID": "id", "clientSecret": "secret" } }"#);
        let err = token_request_form(&settings(AuthMode::Ccg, APP), &app).unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }

    #[test]
    fn test_oauth_form_uses_refresh_token() {
        let form = token_request_form(&settings(AuthMode::OAuth, APP), &app_settings(APP)).unwrap().unwrap();
        assert_eq!(field(&form, "grant_type"), Some("refresh_token"));
        assert_eq!(field(&form, "refresh_token"), Some("refresh"));
        assert_eq!(field(&form, "client_id"), Some("id"));
    }

    #[test]
    fn test_developer_token_needs_no_exchange() {
        let credentials = r#"{ "boxAppSettings": { "clientID": "id", "clientSecret": "s" }, "developerToken": "dev" }"#;
        let driver = BoxDriver::new(&settings(AuthMode::DeveloperToken, credentials)).unwrap();
        assert_eq!(driver.session.token, "dev");
        assert_eq!(driver.root_id, "12345");
        assert_eq!(driver.root_path, "");

        let err = BoxDriver::new(&settings(AuthMode::DeveloperToken, APP)).err().unwrap();
        assert!(matches!(err, Error::Authentication(_)));
    }

    #[test]
    fn test_invalid_credentials_fail_before_network() {
        for payload in [r#"{"invalid": true}"#, "{}"] {
            let err = BoxDriver::new(&settings(AuthMode::Ccg, payload)).err().unwrap();
            assert!(err.is_configuration(), "payload {}", payload);
        }
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(status_error(401, "a", "x".to_owned()), Error::Authentication(_)));
        assert!(matches!(status_error(404, "a", "x".to_owned()), Error::NotFound(p) if p == "a"));
        assert!(matches!(status_error(409, "a", "x".to_owned()), Error::AlreadyExists(_)));
        assert!(matches!(status_error(500, "a", "x".to_owned()), Error::Api { status: 500, .. }));
    }

    #[test]
    fn test_response_item_into_entry() {
        let item: ResponseItem = serde_json::from_str(r#"{
            "type": "file", "id": "99", "name": "file.csv", "size": 12,
            "modified_at": "2024-03-01T10:00:00-08:00"
        }"#).unwrap();
        let entry = item.into_entry("data/file.csv".to_owned()).unwrap();
        assert_eq!(entry.kind, EntryKind::File);
        assert_eq!(entry.size, 12);
        assert_eq!(entry.id.as_deref(), Some("99"));
        assert_eq!(entry.modified.unwrap().to_rfc3339(), "2024-03-01T18:00:00+00:00");

        let link: ResponseItem = serde_json::from_str(r#"{ "type": "web_link", "id": "1", "name": "l" }"#).unwrap();
        assert!(link.into_entry("l".to_owned()).is_none());
    }

    fn folder(id: &str, name: &str) -> ResponseItem {
        ResponseItem { item_type: "folder".to_owned(), id: id.to_owned(), name: name.to_owned(), size: None, modified_at: None }
    }

    fn file(id: &str, name: &str) -> ResponseItem {
        ResponseItem { item_type: "file".to_owned(), id: id.to_owned(), name: name.to_owned(), size: Some(1), modified_at: None }
    }

    /// Folder tree keyed by folder id. Names in `raced` get created by
    /// "someone else" right before our create call, which then sees a 409.
    #[derive(Default)]
    struct StubFolders {
        children: Mutex<HashMap<String, Vec<ResponseItem>>>,
        raced: HashSet<String>,
        send_total: bool,
        next_id: Mutex<u64>,
        pages: Mutex<usize>,
        creates: Mutex<Vec<String>>,
    }

    impl StubFolders {
        fn new(send_total: bool) -> Self {
            StubFolders { send_total, next_id: Mutex::new(100), ..Default::default() }
        }

        fn insert(&self, parent: &str, item: ResponseItem) {
            self.children.lock().unwrap().entry(parent.to_owned()).or_default().push(item);
        }

        fn child_names(&self, parent: &str) -> Vec<String> {
            self.children.lock().unwrap().get(parent)
                .map(|items| items.iter().map(|item| item.name.clone()).collect())
                .unwrap_or_default()
        }

        fn child_id(&self, parent: &str, name: &str) -> String {
            self.children.lock().unwrap()[parent].iter().find(|item| item.name == name).unwrap().id.clone()
        }

        fn allocate(&self) -> String {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            next.to_string()
        }
    }

    impl FolderApi for StubFolders {
        fn fetch_items(&self, folder_id: &str, offset: usize, limit: usize, _context: &str) -> Result<ResponseList> {
            *self.pages.lock().unwrap() += 1;
            let all = self.children.lock().unwrap().get(folder_id).cloned().unwrap_or_default();
            let total = all.len();
            Ok(ResponseList {
                entries: all.into_iter().skip(offset).take(limit).collect(),
                total_count: self.send_total.then_some(total),
            })
        }

        fn create_folder(&self, parent_id: &str, name: &str, context: &str) -> Result<String> {
            let id = self.allocate();
            self.insert(parent_id, folder(&id, name));
            if self.raced.contains(name) {
                return Err(Error::AlreadyExists(context.to_owned()));
            }
            self.creates.lock().unwrap().push(name.to_owned());
            Ok(id)
        }
    }

    #[test]
    fn test_list_all_pages_with_total_count() {
        let api = StubFolders::new(true);
        for i in 0..5 {
            api.insert("0", file(&i.to_string(), &format!("f{}", i)));
        }
        let items = list_all(&api, "0", 2, "").unwrap();
        assert_eq!(items.len(), 5);
        assert_eq!(*api.pages.lock().unwrap(), 3);
    }

    #[test]
    fn test_list_all_pages_without_total_count() {
        let api = StubFolders::new(false);
        for i in 0..4 {
            api.insert("0", file(&i.to_string(), &format!("f{}", i)));
        }
        assert_eq!(list_all(&api, "0", 2, "").unwrap().len(), 4);
        assert_eq!(*api.pages.lock().unwrap(), 3);

        let api = StubFolders::new(false);
        api.insert("0", file("1", "only"));
        assert_eq!(list_all(&api, "0", 2, "").unwrap().len(), 1);
        assert_eq!(*api.pages.lock().unwrap(), 1);
    }

    #[test]
    fn test_resolve_walks_root_path() {
        let api = StubFolders::new(true);
        api.insert("0", folder("10", "a"));
        api.insert("10", folder("11", "b"));
        api.insert("11", file("12", "x.bin"));

        assert_eq!(resolve_item(&api, "0", "a/b", "x.bin").unwrap().id, "12");
        assert_eq!(resolve_item(&api, "0", "a/b", "").unwrap().id, "11");
        assert_eq!(resolve_item(&api, "10", "", "b/x.bin").unwrap().id, "12");
        assert!(matches!(resolve_item(&api, "0", "a/b", "missing"), Err(Error::NotFound(_))));
        assert!(matches!(resolve_item(&api, "0", "a/b", "x.bin/deeper"), Err(Error::NotADirectory(_))));
    }

    #[test]
    fn test_ensure_folders_creates_missing_root_path() {
        let api = StubFolders::new(true);
        let id = ensure_folders(&api, "0", &["a", "b", "c"], true, true).unwrap();
        assert_eq!(*api.creates.lock().unwrap(), vec!["a", "b", "c"]);
        let a = api.child_id("0", "a");
        let b = api.child_id(&a, "b");
        assert_eq!(api.child_id(&b, "c"), id);

        let again = ensure_folders(&api, "0", &["a", "b", "c"], true, true).unwrap();
        assert_eq!(again, id);
        assert_eq!(api.creates.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_ensure_folders_without_parents() {
        let api = StubFolders::new(true);
        let err = ensure_folders(&api, "0", &["a", "b"], false, true).unwrap_err();
        assert!(matches!(err, Error::NotFound(p) if p == "a"));
        assert!(api.child_names("0").is_empty());
    }

    #[test]
    fn test_ensure_folders_picks_up_concurrently_created_folder() {
        let mut api = StubFolders::new(true);
        api.raced.insert("n".to_owned());
        let id = ensure_folders(&api, "0", &["n"], true, true).unwrap();
        assert_eq!(id, api.child_id("0", "n"));

        let err = ensure_folders(&api, "0", &["n"], true, false).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));

        api.raced.insert("m".to_owned());
        let id = ensure_folders(&api, "0", &["m", "leaf"], true, true).unwrap();
        let m = api.child_id("0", "m");
        assert_eq!(api.child_id(&m, "leaf"), id);
    }

    #[test]
    fn test_ensure_folders_refuses_files() {
        let api = StubFolders::new(true);
        api.insert("0", file("5", "data"));
        assert!(matches!(ensure_folders(&api, "0", &["data"], true, true), Err(Error::AlreadyExists(_))));
        assert!(matches!(ensure_folders(&api, "0", &["data", "x"], true, true), Err(Error::NotADirectory(_))));
    }

    #[test]
    fn test_make_dirs_creates_root_path_of_fresh_remote() {
        let api = StubFolders::new(true);
        make_dirs(&api, "0", "a/b", "c", true, true).unwrap();
        assert_eq!(*api.creates.lock().unwrap(), vec!["a", "b", "c"]);

        make_dirs(&api, "0", "a/b", "", true, true).unwrap();
        make_dirs(&api, "0", "a/b", "c", true, true).unwrap();
        assert_eq!(api.creates.lock().unwrap().len(), 3);
        assert!(matches!(make_dirs(&api, "0", "a/b", "c", true, false), Err(Error::AlreadyExists(_))));
        assert!(matches!(make_dirs(&api, "0", "x/y", "c", false, true), Err(Error::NotFound(_))));
        assert!(make_dirs(&api, "0", "", "", true, true).is_ok());
    }
}
