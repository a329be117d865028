//! Shared fakes for module tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Result;
use orbit_process::{CommandOutput, CommandRunner, CommandSpec};
use serde_json::Value;

pub(crate) fn ok_output(stdout: &str) -> CommandOutput {
    CommandOutput {
        exit_code: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
        timed_out: false,
        duration: Duration::from_millis(1),
    }
}

pub(crate) fn fail_output(exit_code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_code,
        stdout: String::new(),
        stderr: stderr.to_string(),
        timed_out: false,
        duration: Duration::from_millis(1),
    }
}

/// Records every command and replays scripted outputs (success by default).
#[derive(Default)]
pub(crate) struct FakeRunner {
    pub calls: Mutex<Vec<CommandSpec>>,
    pub responses: Mutex<VecDeque<CommandOutput>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_with(self, outputs: Vec<CommandOutput>) -> Self {
        *self.responses.lock().expect("responses lock") = outputs.into();
        self
    }

    pub fn recorded(&self) -> Vec<CommandSpec> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn displays(&self) -> Vec<String> {
        self.recorded().iter().map(CommandSpec::display).collect()
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.calls.lock().expect("calls lock").push(spec.clone());
        Ok(self
            .responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or_else(|| ok_output("")))
    }
}

/// Recording gateway fake; ids listed in `fail_ids` error as unavailable,
/// and `conflict_on_upsert` makes every VC upsert report a duplicate.
#[derive(Default)]
pub(crate) struct FakeGateway {
    pub calls: Mutex<Vec<String>>,
    pub fail_ids: std::collections::HashSet<String>,
    pub conflict_on_upsert: bool,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(ids: &[&str]) -> Self {
        Self {
            fail_ids: ids.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn recorded(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, op: &str, id: &str) -> crate::error::ActivityResult<()> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(format!("{op} {id}"));
        if self.fail_ids.contains(id) {
            return Err(crate::error::ActivityError::unavailable(format!(
                "{op} {id}: gateway unreachable"
            )));
        }
        Ok(())
    }
}

impl crate::gateway::GatewayAdmin for FakeGateway {
    fn upsert_virtual_cluster(
        &self,
        _ctx: &crate::context::ActivityContext,
        config: &crate::gateway::VirtualClusterUpsert,
    ) -> crate::error::ActivityResult<()> {
        self.record("upsert_vc", &config.id)?;
        if self.conflict_on_upsert {
            return Err(crate::error::ActivityError::Conflict(format!(
                "virtual cluster {} already exists",
                config.id
            )));
        }
        Ok(())
    }

    fn upsert_credential(
        &self,
        _ctx: &crate::context::ActivityContext,
        credential: &crate::gateway::CredentialUpsert,
    ) -> crate::error::ActivityResult<()> {
        self.record("upsert_credential", &credential.id)
    }

    fn revoke_credential(
        &self,
        _ctx: &crate::context::ActivityContext,
        credential_id: &str,
    ) -> crate::error::ActivityResult<()> {
        self.record("revoke_credential", credential_id)
    }

    fn set_virtual_cluster_read_only(
        &self,
        _ctx: &crate::context::ActivityContext,
        virtual_cluster_id: &str,
        read_only: bool,
    ) -> crate::error::ActivityResult<()> {
        self.record(
            if read_only { "set_read_only" } else { "set_read_write" },
            virtual_cluster_id,
        )
    }

    fn delete_virtual_cluster(
        &self,
        _ctx: &crate::context::ActivityContext,
        virtual_cluster_id: &str,
    ) -> crate::error::ActivityResult<()> {
        self.record("delete_vc", virtual_cluster_id)
    }
}

/// Recording topic-admin fake.
#[derive(Default)]
pub(crate) struct FakeTopicAdmin {
    pub calls: Mutex<Vec<String>>,
    pub specs: Mutex<Vec<crate::adapter::TopicSpec>>,
    pub acls: Mutex<Vec<crate::adapter::AclSpec>>,
    pub fail_names: std::collections::HashSet<String>,
    /// Names whose deletion reports not-found (missing topic or ACL).
    pub missing_names: std::collections::HashSet<String>,
}

impl FakeTopicAdmin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    // Interior-mutable implementations so the fake can also be shared
    // behind an Arc when a test hands out boxed admins per cluster.

    fn do_create_topic(
        &self,
        spec: &crate::adapter::TopicSpec,
    ) -> crate::error::ActivityResult<()> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(format!("create_topic {}", spec.name));
        if self.fail_names.contains(&spec.name) {
            return Err(crate::error::ActivityError::unavailable("broker down"));
        }
        self.specs.lock().expect("specs lock").push(spec.clone());
        Ok(())
    }

    fn do_delete_topic(&self, name: &str) -> crate::error::ActivityResult<()> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(format!("delete_topic {name}"));
        if self.fail_names.contains(name) {
            return Err(crate::error::ActivityError::unavailable("broker down"));
        }
        if self.missing_names.contains(name) {
            return Err(crate::error::ActivityError::not_found(name.to_string()));
        }
        Ok(())
    }

    fn do_create_acl(&self, spec: &crate::adapter::AclSpec) -> crate::error::ActivityResult<()> {
        self.calls.lock().expect("calls lock").push(format!(
            "create_acl {:?} {}",
            spec.operation, spec.resource_name
        ));
        self.acls.lock().expect("acls lock").push(spec.clone());
        Ok(())
    }

    fn do_delete_acl(&self, spec: &crate::adapter::AclSpec) -> crate::error::ActivityResult<()> {
        self.calls.lock().expect("calls lock").push(format!(
            "delete_acl {:?} {}",
            spec.operation, spec.resource_name
        ));
        if self.missing_names.contains(&spec.resource_name) {
            return Err(crate::error::ActivityError::not_found(format!(
                "acl on {}",
                spec.resource_name
            )));
        }
        Ok(())
    }
}

impl crate::adapter::TopicAdmin for FakeTopicAdmin {
    fn create_topic(
        &mut self,
        _ctx: &crate::context::ActivityContext,
        spec: &crate::adapter::TopicSpec,
    ) -> crate::error::ActivityResult<()> {
        self.do_create_topic(spec)
    }

    fn delete_topic(
        &mut self,
        _ctx: &crate::context::ActivityContext,
        name: &str,
    ) -> crate::error::ActivityResult<()> {
        self.do_delete_topic(name)
    }

    fn create_acl(
        &mut self,
        _ctx: &crate::context::ActivityContext,
        spec: &crate::adapter::AclSpec,
    ) -> crate::error::ActivityResult<()> {
        self.do_create_acl(spec)
    }

    fn delete_acl(
        &mut self,
        _ctx: &crate::context::ActivityContext,
        spec: &crate::adapter::AclSpec,
    ) -> crate::error::ActivityResult<()> {
        self.do_delete_acl(spec)
    }
}

impl crate::adapter::TopicAdmin for Arc<FakeTopicAdmin> {
    fn create_topic(
        &mut self,
        _ctx: &crate::context::ActivityContext,
        spec: &crate::adapter::TopicSpec,
    ) -> crate::error::ActivityResult<()> {
        self.do_create_topic(spec)
    }

    fn delete_topic(
        &mut self,
        _ctx: &crate::context::ActivityContext,
        name: &str,
    ) -> crate::error::ActivityResult<()> {
        self.do_delete_topic(name)
    }

    fn create_acl(
        &mut self,
        _ctx: &crate::context::ActivityContext,
        spec: &crate::adapter::AclSpec,
    ) -> crate::error::ActivityResult<()> {
        self.do_create_acl(spec)
    }

    fn delete_acl(
        &mut self,
        _ctx: &crate::context::ActivityContext,
        spec: &crate::adapter::AclSpec,
    ) -> crate::error::ActivityResult<()> {
        self.do_delete_acl(spec)
    }
}

/// Recording object-store fake.
#[derive(Default)]
pub(crate) struct FakeObjectStore {
    pub uploads: Mutex<Vec<(String, Vec<u8>)>>,
    pub fail: bool,
}

impl FakeObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn recorded_paths(&self) -> Vec<String> {
        self.uploads
            .lock()
            .expect("uploads lock")
            .iter()
            .map(|(path, _)| path.clone())
            .collect()
    }
}

impl crate::objectstore::ObjectStore for FakeObjectStore {
    fn upload_json(
        &self,
        _ctx: &crate::context::ActivityContext,
        path: &str,
        payload: &Value,
    ) -> crate::error::ActivityResult<u64> {
        if self.fail {
            return Err(crate::error::ActivityError::unavailable(
                "object store unreachable",
            ));
        }
        let bytes = serde_json::to_vec(payload).expect("serialize");
        let len = bytes.len() as u64;
        self.uploads
            .lock()
            .expect("uploads lock")
            .push((path.to_string(), bytes));
        Ok(len)
    }

    fn upload_bytes(
        &self,
        _ctx: &crate::context::ActivityContext,
        path: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> crate::error::ActivityResult<String> {
        if self.fail {
            return Err(crate::error::ActivityError::unavailable(
                "object store unreachable",
            ));
        }
        self.uploads
            .lock()
            .expect("uploads lock")
            .push((path.to_string(), bytes.to_vec()));
        Ok(format!("http://store/{path}"))
    }
}

/// One scripted CMS response.
pub(crate) struct Route {
    pub method: &'static str,
    pub path_contains: &'static str,
    pub status: u16,
    pub body: Value,
    /// Consumed after the first match; later requests fall through to the
    /// next matching route.
    pub once: bool,
}

impl Route {
    pub fn get(path_contains: &'static str, body: Value) -> Self {
        Self {
            method: "GET",
            path_contains,
            status: 200,
            body,
            once: false,
        }
    }

    pub fn get_once(path_contains: &'static str, body: Value) -> Self {
        Self {
            once: true,
            ..Self::get(path_contains, body)
        }
    }

    pub fn patch(path_contains: &'static str, body: Value) -> Self {
        Self {
            method: "PATCH",
            path_contains,
            status: 200,
            body,
            once: false,
        }
    }

    pub fn post(path_contains: &'static str, body: Value) -> Self {
        Self {
            method: "POST",
            path_contains,
            status: 200,
            body,
            once: false,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

struct RouteState {
    route: Route,
    consumed: bool,
}

/// A recorded request: method, url, body.
pub(crate) type RecordedRequest = (String, String, String);

/// Scripted CMS fixture on a real listener.
pub(crate) struct MockCms {
    pub base_url: String,
    pub requests: Arc<Mutex<Vec<RecordedRequest>>>,
    server: Arc<tiny_http::Server>,
    handle: Option<JoinHandle<()>>,
}

impl MockCms {
    pub fn start(routes: Vec<Route>) -> Self {
        let server =
            Arc::new(tiny_http::Server::http("127.0.0.1:0").expect("mock cms listener"));
        let base_url = format!("http://{}", server.server_addr());
        let requests: Arc<Mutex<Vec<RecordedRequest>>> = Arc::default();

        let states: Vec<RouteState> = routes
            .into_iter()
            .map(|route| RouteState {
                route,
                consumed: false,
            })
            .collect();
        let states = Mutex::new(states);

        let server_thread = Arc::clone(&server);
        let requests_thread = Arc::clone(&requests);
        let handle = std::thread::spawn(move || {
            while let Ok(mut request) = server_thread.recv() {
                let method = request.method().to_string();
                let url = request.url().to_string();
                let mut body = String::new();
                use std::io::Read;
                let _ = request.as_reader().read_to_string(&mut body);
                requests_thread
                    .lock()
                    .expect("requests lock")
                    .push((method.clone(), url.clone(), body));

                let mut states = states.lock().expect("routes lock");
                let matched = states.iter_mut().find(|state| {
                    !state.consumed
                        && state.route.method == method
                        && url.contains(state.route.path_contains)
                });
                let response = match matched {
                    Some(state) => {
                        if state.route.once {
                            state.consumed = true;
                        }
                        tiny_http::Response::from_string(state.route.body.to_string())
                            .with_status_code(state.route.status)
                    }
                    None => tiny_http::Response::from_string(
                        r#"{"errors":[{"message":"no scripted route"}]}"#,
                    )
                    .with_status_code(404),
                };
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            requests,
            server,
            handle: Some(handle),
        }
    }

    pub fn client(&self) -> crate::cms::CmsClient {
        crate::cms::CmsClient::new(self.base_url.clone(), None).expect("mock cms client")
    }

    pub fn recorded(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    /// Recorded PATCH bodies whose url contains the fragment.
    pub fn patches_to(&self, fragment: &str) -> Vec<Value> {
        self.recorded()
            .iter()
            .filter(|(method, url, _)| method == "PATCH" && url.contains(fragment))
            .map(|(_, _, body)| serde_json::from_str(body).unwrap_or(Value::Null))
            .collect()
    }
}

impl Drop for MockCms {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
