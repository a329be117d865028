//! Kafka admin protocol over a blocking TCP connection.
//!
//! The admin surface this layer needs is four request types: CreateTopics,
//! DeleteTopics, CreateAcls, DeleteAcls, plus the SASL PLAIN handshake for
//! credentialed clusters. Messages are encoded with the `kafka-protocol`
//! codecs at pinned pre-flexible API versions, framed with the standard
//! 4-byte length prefix. One connection per activity invocation; dropping
//! the admin closes it.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use kafka_protocol::messages::create_acls_request::{AclCreation, CreateAclsRequest};
use kafka_protocol::messages::create_acls_response::CreateAclsResponse;
use kafka_protocol::messages::create_topics_request::{
    CreatableTopic, CreateableTopicConfig, CreateTopicsRequest,
};
use kafka_protocol::messages::create_topics_response::CreateTopicsResponse;
use kafka_protocol::messages::delete_acls_request::{DeleteAclsFilter, DeleteAclsRequest};
use kafka_protocol::messages::delete_acls_response::DeleteAclsResponse;
use kafka_protocol::messages::delete_topics_request::DeleteTopicsRequest;
use kafka_protocol::messages::delete_topics_response::DeleteTopicsResponse;
use kafka_protocol::messages::sasl_authenticate_request::SaslAuthenticateRequest;
use kafka_protocol::messages::sasl_authenticate_response::SaslAuthenticateResponse;
use kafka_protocol::messages::sasl_handshake_request::SaslHandshakeRequest;
use kafka_protocol::messages::sasl_handshake_response::SaslHandshakeResponse;
use kafka_protocol::messages::{RequestHeader, ResponseHeader};
use kafka_protocol::protocol::{Decodable, Encodable, StrBytes};

use crate::adapter::{AclSpec, ConnectionConfig, TopicAdmin, TopicSpec};
use crate::context::ActivityContext;
use crate::error::{ActivityError, ActivityResult};

// Admin API keys.
const API_SASL_HANDSHAKE: i16 = 17;
const API_CREATE_TOPICS: i16 = 19;
const API_DELETE_TOPICS: i16 = 20;
const API_CREATE_ACLS: i16 = 30;
const API_DELETE_ACLS: i16 = 31;
const API_SASL_AUTHENTICATE: i16 = 36;

// Pinned pre-flexible versions: request header v1, response header v0.
const CREATE_TOPICS_VERSION: i16 = 2;
const DELETE_TOPICS_VERSION: i16 = 1;
const CREATE_ACLS_VERSION: i16 = 1;
const DELETE_ACLS_VERSION: i16 = 1;
const SASL_HANDSHAKE_VERSION: i16 = 1;
const SASL_AUTHENTICATE_VERSION: i16 = 0;
const REQUEST_HEADER_VERSION: i16 = 1;
const RESPONSE_HEADER_VERSION: i16 = 0;

// Error codes this layer maps to typed kinds.
const UNKNOWN_TOPIC_OR_PARTITION: i16 = 3;
const TOPIC_AUTHORIZATION_FAILED: i16 = 29;
const CLUSTER_AUTHORIZATION_FAILED: i16 = 31;
const TOPIC_ALREADY_EXISTS: i16 = 36;
const SASL_AUTHENTICATION_FAILED: i16 = 58;

fn sb(s: &str) -> StrBytes {
    StrBytes::from_string(s.to_string())
}

fn code_error(code: i16, what: &str) -> ActivityError {
    match code {
        UNKNOWN_TOPIC_OR_PARTITION => ActivityError::not_found(what.to_string()),
        TOPIC_ALREADY_EXISTS => ActivityError::Conflict(format!("{what}: already exists")),
        TOPIC_AUTHORIZATION_FAILED | CLUSTER_AUTHORIZATION_FAILED | SASL_AUTHENTICATION_FAILED => {
            ActivityError::PermissionDenied(format!("{what}: error code {code}"))
        }
        _ => ActivityError::unavailable(format!("{what}: error code {code}")),
    }
}

/// Blocking admin connection to one bootstrap broker.
#[derive(Debug)]
pub struct KafkaWireAdmin {
    stream: TcpStream,
    correlation: i32,
}

impl KafkaWireAdmin {
    /// Connect to the first reachable bootstrap server and authenticate when
    /// credentials are present.
    pub fn connect(ctx: &ActivityContext, config: &ConnectionConfig) -> ActivityResult<Self> {
        ctx.ensure_active()?;
        let stream = connect_bootstrap(&config.bootstrap_servers, ctx.remaining())?;
        let mut admin = Self {
            stream,
            correlation: 0,
        };
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            admin.sasl_plain(ctx, username, password)?;
        }
        Ok(admin)
    }

    fn sasl_plain(
        &mut self,
        ctx: &ActivityContext,
        username: &str,
        password: &str,
    ) -> ActivityResult<()> {
        let mut handshake = SaslHandshakeRequest::default();
        handshake.mechanism = StrBytes::from_static_str("PLAIN");
        let resp: SaslHandshakeResponse = self.call(
            ctx,
            API_SASL_HANDSHAKE,
            SASL_HANDSHAKE_VERSION,
            &handshake,
            "sasl handshake",
        )?;
        if resp.error_code != 0 {
            return Err(code_error(resp.error_code, "sasl handshake"));
        }

        let mut auth = SaslAuthenticateRequest::default();
        auth.auth_bytes = Bytes::from(format!("\0{username}\0{password}").into_bytes());
        let resp: SaslAuthenticateResponse = self.call(
            ctx,
            API_SASL_AUTHENTICATE,
            SASL_AUTHENTICATE_VERSION,
            &auth,
            "sasl authenticate",
        )?;
        if resp.error_code != 0 {
            return Err(ActivityError::PermissionDenied(format!(
                "sasl authenticate: error code {}",
                resp.error_code
            )));
        }
        Ok(())
    }

    fn call<Req, Resp>(
        &mut self,
        ctx: &ActivityContext,
        api_key: i16,
        version: i16,
        request: &Req,
        what: &str,
    ) -> ActivityResult<Resp>
    where
        Req: Encodable,
        Resp: Decodable,
    {
        ctx.ensure_active()?;
        let timeout = ctx.remaining();
        let _ = self.stream.set_read_timeout(Some(timeout));
        let _ = self.stream.set_write_timeout(Some(timeout));

        self.correlation += 1;
        let mut header = RequestHeader::default();
        header.request_api_key = api_key;
        header.request_api_version = version;
        header.correlation_id = self.correlation;
        header.client_id = Some(StrBytes::from_static_str("orbit-activities"));

        let mut payload = BytesMut::new();
        header
            .encode(&mut payload, REQUEST_HEADER_VERSION)
            .map_err(|e| ActivityError::Other(anyhow::anyhow!("{what}: encoding header: {e:?}")))?;
        request
            .encode(&mut payload, version)
            .map_err(|e| ActivityError::Other(anyhow::anyhow!("{what}: encoding request: {e:?}")))?;

        let mut frame = BytesMut::with_capacity(payload.len() + 4);
        frame.put_i32(payload.len() as i32);
        frame.extend_from_slice(&payload);
        self.stream
            .write_all(&frame)
            .map_err(|e| ActivityError::unavailable(format!("{what}: writing request: {e}")))?;

        let mut len_buf = [0u8; 4];
        self.stream
            .read_exact(&mut len_buf)
            .map_err(|e| ActivityError::unavailable(format!("{what}: reading response: {e}")))?;
        let len = i32::from_be_bytes(len_buf);
        if !(0..=64 * 1024 * 1024).contains(&len) {
            return Err(ActivityError::unavailable(format!(
                "{what}: invalid response frame length {len}"
            )));
        }
        let mut body = vec![0u8; len as usize];
        self.stream
            .read_exact(&mut body)
            .map_err(|e| ActivityError::unavailable(format!("{what}: reading response: {e}")))?;

        let mut buf = Bytes::from(body);
        ResponseHeader::decode(&mut buf, RESPONSE_HEADER_VERSION)
            .map_err(|e| ActivityError::Other(anyhow::anyhow!("{what}: decoding header: {e:?}")))?;
        Resp::decode(&mut buf, version)
            .map_err(|e| ActivityError::Other(anyhow::anyhow!("{what}: decoding response: {e:?}")))
    }

    fn request_timeout_ms(ctx: &ActivityContext) -> i32 {
        ctx.remaining().as_millis().min(i32::MAX as u128) as i32
    }
}

impl TopicAdmin for KafkaWireAdmin {
    fn create_topic(&mut self, ctx: &ActivityContext, spec: &TopicSpec) -> ActivityResult<()> {
        let what = format!("creating topic {}", spec.name);

        let mut topic = CreatableTopic::default();
        topic.name = sb(&spec.name).into();
        topic.num_partitions = spec.partitions;
        topic.replication_factor = spec.replication_factor;
        topic.configs = spec
            .config
            .iter()
            .map(|(name, value)| {
                let mut config = CreateableTopicConfig::default();
                config.name = sb(name);
                config.value = Some(sb(value));
                config
            })
            .collect();

        let mut request = CreateTopicsRequest::default();
        request.topics = vec![topic];
        request.timeout_ms = Self::request_timeout_ms(ctx);

        let resp: CreateTopicsResponse =
            self.call(ctx, API_CREATE_TOPICS, CREATE_TOPICS_VERSION, &request, &what)?;
        for result in &resp.topics {
            if result.error_code != 0 {
                return Err(code_error(result.error_code, &what));
            }
        }
        Ok(())
    }

    fn delete_topic(&mut self, ctx: &ActivityContext, name: &str) -> ActivityResult<()> {
        let what = format!("deleting topic {name}");

        let mut request = DeleteTopicsRequest::default();
        request.topic_names = vec![sb(name).into()];
        request.timeout_ms = Self::request_timeout_ms(ctx);

        let resp: DeleteTopicsResponse =
            self.call(ctx, API_DELETE_TOPICS, DELETE_TOPICS_VERSION, &request, &what)?;
        for result in &resp.responses {
            if result.error_code != 0 {
                return Err(code_error(result.error_code, &what));
            }
        }
        Ok(())
    }

    fn create_acl(&mut self, ctx: &ActivityContext, spec: &AclSpec) -> ActivityResult<()> {
        let what = format!(
            "creating acl {:?} on {}",
            spec.operation, spec.resource_name
        );

        let mut creation = AclCreation::default();
        creation.resource_type = spec.resource_type.wire_id();
        creation.resource_name = sb(&spec.resource_name);
        creation.resource_pattern_type = spec.pattern_type.wire_id();
        creation.principal = sb(&spec.principal);
        creation.host = sb(&spec.host);
        creation.operation = spec.operation.wire_id();
        creation.permission_type = spec.permission_type.wire_id();

        let mut request = CreateAclsRequest::default();
        request.creations = vec![creation];

        let resp: CreateAclsResponse =
            self.call(ctx, API_CREATE_ACLS, CREATE_ACLS_VERSION, &request, &what)?;
        for result in &resp.results {
            if result.error_code != 0 {
                return Err(code_error(result.error_code, &what));
            }
        }
        Ok(())
    }

    fn delete_acl(&mut self, ctx: &ActivityContext, spec: &AclSpec) -> ActivityResult<()> {
        let what = format!(
            "deleting acl {:?} on {}",
            spec.operation, spec.resource_name
        );

        let mut filter = DeleteAclsFilter::default();
        filter.resource_type_filter = spec.resource_type.wire_id();
        filter.resource_name_filter = Some(sb(&spec.resource_name));
        filter.pattern_type_filter = spec.pattern_type.wire_id();
        filter.principal_filter = Some(sb(&spec.principal));
        filter.host_filter = Some(sb(&spec.host));
        filter.operation = spec.operation.wire_id();
        filter.permission_type = spec.permission_type.wire_id();

        let mut request = DeleteAclsRequest::default();
        request.filters = vec![filter];

        let resp: DeleteAclsResponse =
            self.call(ctx, API_DELETE_ACLS, DELETE_ACLS_VERSION, &request, &what)?;
        for result in &resp.filter_results {
            if result.error_code != 0 {
                return Err(code_error(result.error_code, &what));
            }
            // A filter that matched nothing is how the broker reports a
            // missing ACL; surface it so revocation can warn and move on.
            if result.matching_acls.is_empty() {
                return Err(ActivityError::not_found(what.clone()));
            }
        }
        Ok(())
    }
}

fn connect_bootstrap(bootstrap_servers: &str, timeout: Duration) -> ActivityResult<TcpStream> {
    let mut last_err = None;
    for server in bootstrap_servers.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let addrs = match server.to_socket_addrs() {
            Ok(addrs) => addrs,
            Err(e) => {
                last_err = Some(format!("{server}: {e}"));
                continue;
            }
        };
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    let _ = stream.set_nodelay(true);
                    return Ok(stream);
                }
                Err(e) => last_err = Some(format!("{server}: {e}")),
            }
        }
    }
    Err(ActivityError::unavailable(format!(
        "connecting to kafka bootstrap {bootstrap_servers}: {}",
        last_err.unwrap_or_else(|| "no servers listed".to_string())
    )))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::net::TcpListener;
    use std::thread;

    use kafka_protocol::messages::create_topics_response::CreatableTopicResult;
    use kafka_protocol::messages::delete_acls_response::DeleteAclsFilterResult;

    use super::*;

    fn read_frame(stream: &mut TcpStream) -> Bytes {
        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).expect("frame length");
        let len = i32::from_be_bytes(len_buf) as usize;
        let mut body = vec![0u8; len];
        stream.read_exact(&mut body).expect("frame body");
        Bytes::from(body)
    }

    fn write_response<R: Encodable>(stream: &mut TcpStream, correlation_id: i32, resp: &R, version: i16) {
        let mut payload = BytesMut::new();
        let mut header = ResponseHeader::default();
        header.correlation_id = correlation_id;
        header.encode(&mut payload, RESPONSE_HEADER_VERSION).expect("header");
        resp.encode(&mut payload, version).expect("body");
        let mut frame = BytesMut::with_capacity(payload.len() + 4);
        frame.put_i32(payload.len() as i32);
        frame.extend_from_slice(&payload);
        stream.write_all(&frame).expect("write frame");
    }

    fn fake_broker<F>(handler: F) -> (String, thread::JoinHandle<()>)
    where
        F: FnOnce(TcpStream) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("listener");
        let addr = listener.local_addr().expect("addr").to_string();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            handler(stream);
        });
        (addr, handle)
    }

    fn plain_config(addr: &str) -> ConnectionConfig {
        ConnectionConfig {
            bootstrap_servers: addr.to_string(),
            username: None,
            password: None,
        }
    }

    #[test]
    fn create_topic_round_trips() {
        let (addr, handle) = fake_broker(|mut stream| {
            let mut buf = read_frame(&mut stream);
            let header =
                RequestHeader::decode(&mut buf, REQUEST_HEADER_VERSION).expect("request header");
            assert_eq!(header.request_api_key, API_CREATE_TOPICS);
            assert_eq!(header.request_api_version, CREATE_TOPICS_VERSION);
            let request = CreateTopicsRequest::decode(&mut buf, CREATE_TOPICS_VERSION)
                .expect("request body");
            assert_eq!(request.topics.len(), 1);
            assert_eq!(request.topics[0].num_partitions, 3);
            assert_eq!(request.topics[0].replication_factor, 2);
            assert_eq!(request.topics[0].configs.len(), 3);

            let mut result = CreatableTopicResult::default();
            result.name = request.topics[0].name.clone();
            result.error_code = 0;
            let mut resp = CreateTopicsResponse::default();
            resp.topics = vec![result];
            write_response(&mut stream, header.correlation_id, &resp, CREATE_TOPICS_VERSION);
        });

        let ctx = ActivityContext::background("test");
        let mut admin = KafkaWireAdmin::connect(&ctx, &plain_config(&addr)).expect("connect");

        let mut config = BTreeMap::new();
        config.insert("retention.ms".to_string(), "604800000".to_string());
        config.insert("cleanup.policy".to_string(), "delete".to_string());
        config.insert("compression.type".to_string(), "lz4".to_string());
        let spec = TopicSpec {
            name: "dev-myws-myapp-events".to_string(),
            partitions: 3,
            replication_factor: 2,
            config,
        };
        admin.create_topic(&ctx, &spec).expect("create topic");
        handle.join().unwrap();
    }

    #[test]
    fn create_topic_already_exists_is_a_conflict() {
        let (addr, handle) = fake_broker(|mut stream| {
            let mut buf = read_frame(&mut stream);
            let header =
                RequestHeader::decode(&mut buf, REQUEST_HEADER_VERSION).expect("request header");
            let request = CreateTopicsRequest::decode(&mut buf, CREATE_TOPICS_VERSION)
                .expect("request body");

            let mut result = CreatableTopicResult::default();
            result.name = request.topics[0].name.clone();
            result.error_code = 36;
            let mut resp = CreateTopicsResponse::default();
            resp.topics = vec![result];
            write_response(&mut stream, header.correlation_id, &resp, CREATE_TOPICS_VERSION);
        });

        let ctx = ActivityContext::background("test");
        let mut admin = KafkaWireAdmin::connect(&ctx, &plain_config(&addr)).expect("connect");
        let err = admin
            .create_topic(&ctx, &TopicSpec {
                name: "dup".to_string(),
                partitions: 1,
                replication_factor: 1,
                config: BTreeMap::new(),
            })
            .expect_err("already exists");
        assert!(matches!(err, ActivityError::Conflict(_)));
        handle.join().unwrap();
    }

    #[test]
    fn delete_acl_with_no_match_is_not_found() {
        let (addr, handle) = fake_broker(|mut stream| {
            let mut buf = read_frame(&mut stream);
            let header =
                RequestHeader::decode(&mut buf, REQUEST_HEADER_VERSION).expect("request header");
            assert_eq!(header.request_api_key, API_DELETE_ACLS);
            DeleteAclsRequest::decode(&mut buf, DELETE_ACLS_VERSION).expect("request body");

            // One filter result, no matching acls.
            let mut resp = DeleteAclsResponse::default();
            resp.filter_results = vec![DeleteAclsFilterResult::default()];
            write_response(&mut stream, header.correlation_id, &resp, DELETE_ACLS_VERSION);
        });

        let ctx = ActivityContext::background("test");
        let mut admin = KafkaWireAdmin::connect(&ctx, &plain_config(&addr)).expect("connect");
        let acl = AclSpec::topic_allow("dev-t", "User:svc-x", crate::adapter::AclOperation::Read);
        let err = admin.delete_acl(&ctx, &acl).expect_err("no match");
        assert!(matches!(err, ActivityError::NotFound(_)));
        handle.join().unwrap();
    }

    #[test]
    fn connect_failure_is_retryable() {
        let ctx = ActivityContext::background("test");
        // Port 1 refuses connections.
        let err = KafkaWireAdmin::connect(&ctx, &plain_config("127.0.0.1:1")).expect_err("refused");
        assert!(matches!(err, ActivityError::Unavailable(_)));
    }

    #[test]
    fn code_mapping_covers_the_interesting_codes() {
        assert!(matches!(code_error(3, "x"), ActivityError::NotFound(_)));
        assert!(matches!(code_error(36, "x"), ActivityError::Conflict(_)));
        assert!(matches!(
            code_error(29, "x"),
            ActivityError::PermissionDenied(_)
        ));
        assert!(matches!(code_error(7, "x"), ActivityError::Unavailable(_)));
    }
}
