//! Session against the external API of an Odoo server.
//!
//! Authentication happens once through the `common` service; every model
//! operation then goes through `execute_kw` on the `object` service with the
//! obtained uid.

use std::fmt;
use std::sync::Arc;

use log::{debug, trace};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value as Json};

use crate::config::Config;
use crate::domain::{Domain, SearchOptions};
use crate::error::{Error, Result};
use crate::xmlrpc::{self, Client, HttpTransport, Request, Struct, ToValue, Transport, Value};

/// One record as returned by `read`/`search_read`, keyed by field name.
pub type Record = Map<String, Json>;

/// Answer of the `version` call on the `common` service.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerVersion {
    pub server_version: String,
    pub server_version_info: Vec<Json>,
    pub server_serie: String,
    pub protocol_version: i64,
}

pub struct Odoo {
    config: Config,
    common: Client,
    models: Client,
    uid: i64,
    server_version: ServerVersion,
}

impl fmt::Debug for Odoo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Odoo")
            .field("config", &self.config)
            .field("uid", &self.uid)
            .field("server_version", &self.server_version.server_version)
            .finish()
    }
}

impl Odoo {
    /// Connects over HTTP(S) and authenticates.
    pub async fn connect(config: Config) -> Result<Odoo> {
        let transport = Arc::new(HttpTransport::new(config.timeout));
        Odoo::connect_with(config, transport).await
    }

    pub async fn connect_with(config: Config, transport: Arc<dyn Transport>) -> Result<Odoo> {
        let common = Client::new(&config.endpoint("common"), transport.clone())?;
        let models = Client::new(&config.endpoint("object"), transport)?;

        let server_version: ServerVersion = common
            .remote_call(&Request::new("version").finalize())
            .await?
            .result()?;
        debug!(
            "Odoo server {} at {}",
            server_version.server_version, config.hostname
        );

        let request = Request::new("authenticate")
            .argument(&config.database)
            .argument(&config.username)
            .argument(&config.password)
            .argument(&Struct::new())
            .finalize();
        let uid = match common.call(&request).await? {
            Value::Int(uid) => uid,
            Value::Boolean(false) => {
                return Err(Error::AuthenticationFailed {
                    database: config.database.clone(),
                    username: config.username.clone(),
                })
            }
            other => return Err(Error::unexpected("int uid", &other)),
        };
        debug!("Authenticated `{}` as uid {}", config.username, uid);

        Ok(Odoo {
            config,
            common,
            models,
            uid,
            server_version,
        })
    }

    pub fn hostname(&self) -> &str {
        &self.config.hostname
    }

    pub fn database(&self) -> &str {
        &self.config.database
    }

    pub fn username(&self) -> &str {
        &self.config.username
    }

    pub fn uid(&self) -> i64 {
        self.uid
    }

    pub fn server_version(&self) -> &ServerVersion {
        &self.server_version
    }

    pub fn common(&self) -> &Client {
        &self.common
    }

    pub fn models(&self) -> &Client {
        &self.models
    }

    /// Calls `method` on `model` with positional `args` and optional keyword arguments.
    pub async fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Option<Struct>,
    ) -> Result<Value> {
        trace!("execute_kw {}.{} as uid {}", model, method, self.uid);

        let mut request = Request::new("execute_kw")
            .argument(&self.config.database)
            .argument(&self.uid)
            .argument(&self.config.password)
            .argument(model)
            .argument(method)
            .argument(&args);
        if let Some(kwargs) = kwargs {
            request = request.argument(&kwargs);
        }

        self.models.call(&request.finalize()).await
    }

    /// Ids of the records matching `domain`.
    pub async fn search(
        &self,
        model: &str,
        domain: &Domain,
        options: &SearchOptions,
    ) -> Result<Vec<i64>> {
        let mut kwargs = Struct::new();
        options.apply(&mut kwargs);

        let result = self
            .execute_kw(model, "search", vec![domain.to_value()], non_empty(kwargs))
            .await?;
        ids(&result)
    }

    pub async fn search_count(&self, model: &str, domain: &Domain) -> Result<i64> {
        let result = self
            .execute_kw(model, "search_count", vec![domain.to_value()], None)
            .await?;
        result
            .as_i64()
            .ok_or_else(|| Error::unexpected("int count", &result))
    }

    /// Reads `fields` of the records `ids`; all fields when `fields` is empty.
    pub async fn read(&self, model: &str, ids: &[i64], fields: &[&str]) -> Result<Vec<Record>> {
        let mut kwargs = Struct::new();
        if !fields.is_empty() {
            kwargs.insert("fields".to_string(), fields.to_value());
        }

        let result = self
            .execute_kw(model, "read", vec![ids.to_value()], non_empty(kwargs))
            .await?;
        records(result)
    }

    pub async fn read_as<T: DeserializeOwned>(
        &self,
        model: &str,
        ids: &[i64],
        fields: &[&str],
    ) -> Result<Vec<T>> {
        decode_records(self.read(model, ids, fields).await?)
    }

    /// Field definitions of `model`, keyed by field name.
    pub async fn fields_get(
        &self,
        model: &str,
        fields: &[&str],
        attributes: &[&str],
    ) -> Result<Map<String, Json>> {
        let args = if fields.is_empty() {
            Vec::new()
        } else {
            vec![fields.to_value()]
        };
        let mut kwargs = Struct::new();
        if !attributes.is_empty() {
            kwargs.insert("attributes".to_string(), attributes.to_value());
        }

        match self.execute_kw(model, "fields_get", args, non_empty(kwargs)).await? {
            Value::Struct(members) => Ok(members
                .into_iter()
                .map(|(name, definition)| (name, definition.into_json()))
                .collect()),
            other => Err(Error::unexpected("struct of fields", &other)),
        }
    }

    pub async fn search_read(
        &self,
        model: &str,
        domain: &Domain,
        fields: &[&str],
        options: &SearchOptions,
    ) -> Result<Vec<Record>> {
        let mut kwargs = Struct::new();
        if !fields.is_empty() {
            kwargs.insert("fields".to_string(), fields.to_value());
        }
        options.apply(&mut kwargs);

        let result = self
            .execute_kw(model, "search_read", vec![domain.to_value()], non_empty(kwargs))
            .await?;
        records(result)
    }

    pub async fn search_read_as<T: DeserializeOwned>(
        &self,
        model: &str,
        domain: &Domain,
        fields: &[&str],
        options: &SearchOptions,
    ) -> Result<Vec<T>> {
        decode_records(self.search_read(model, domain, fields, options).await?)
    }

    /// Creates one record and returns its id.
    pub async fn create<V: ToValue + ?Sized>(&self, model: &str, values: &V) -> Result<i64> {
        let result = self
            .execute_kw(model, "create", vec![values.to_value()], None)
            .await?;
        result
            .as_i64()
            .ok_or_else(|| Error::unexpected("int id", &result))
    }

    pub async fn write<V: ToValue + ?Sized>(
        &self,
        model: &str,
        ids: &[i64],
        values: &V,
    ) -> Result<bool> {
        let result = self
            .execute_kw(model, "write", vec![ids.to_value(), values.to_value()], None)
            .await?;
        result
            .as_bool()
            .ok_or_else(|| Error::unexpected("boolean", &result))
    }

    /// Display names of the records `ids`.
    pub async fn name_get(&self, model: &str, ids: &[i64]) -> Result<Vec<(i64, String)>> {
        let result = self
            .execute_kw(model, "name_get", vec![ids.to_value()], None)
            .await?;
        let pairs = result
            .as_array()
            .ok_or_else(|| Error::unexpected("array of pairs", &result))?;

        pairs
            .iter()
            .map(|pair| match pair.as_array().map(Vec::as_slice) {
                Some([Value::Int(id), Value::String(name)]) => Ok((*id, name.clone())),
                _ => Err(Error::unexpected("[id, name] pair", pair)),
            })
            .collect()
    }

    pub async fn unlink(&self, model: &str, ids: &[i64]) -> Result<bool> {
        let result = self
            .execute_kw(model, "unlink", vec![ids.to_value()], None)
            .await?;
        result
            .as_bool()
            .ok_or_else(|| Error::unexpected("boolean", &result))
    }
}

fn non_empty(kwargs: Struct) -> Option<Struct> {
    if kwargs.is_empty() {
        None
    } else {
        Some(kwargs)
    }
}

fn ids(result: &Value) -> Result<Vec<i64>> {
    let items = result
        .as_array()
        .ok_or_else(|| Error::unexpected("array of ids", result))?;
    items
        .iter()
        .map(|item| item.as_i64().ok_or_else(|| Error::unexpected("int id", item)))
        .collect()
}

fn records(result: Value) -> Result<Vec<Record>> {
    match result {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item.into_json() {
                Json::Object(record) => Ok(record),
                other => Err(Error::UnexpectedType {
                    expected: "record struct",
                    found: json_type_name(&other).to_string(),
                }),
            })
            .collect(),
        other => Err(Error::unexpected("array of records", &other)),
    }
}

fn decode_records<T: DeserializeOwned>(records: Vec<Record>) -> Result<Vec<T>> {
    records
        .into_iter()
        .map(|record| xmlrpc::from_value(Value::from_json(Json::Object(record))))
        .collect()
}

fn json_type_name(json: &Json) -> &'static str {
    match *json {
        Json::Null => "nil",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "struct",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Operator;
    use async_trait::async_trait;
    use hyper::Uri;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const VERSION: &str = "<?xml version='1.0'?>
<methodResponse>
<params>
<param>
<value><struct>
<member>
<name>server_version</name>
<value><string>14.0</string></value>
</member>
<member>
<name>server_version_info</name>
<value><array><data>
<value><int>14</int></value>
<value><int>0</int></value>
<value><int>0</int></value>
<value><string>final</string></value>
<value><int>0</int></value>
<value><string></string></value>
</data></array></value>
</member>
<member>
<name>server_serie</name>
<value><string>14.0</string></value>
</member>
<member>
<name>protocol_version</name>
<value><int>1</int></value>
</member>
</struct></value>
</param>
</params>
</methodResponse>
";

    fn ok(value: &str) -> String {
        format!(
            "<?xml version='1.0'?>\n<methodResponse>\n<params>\n<param>\n{}\n</param>\n</params>\n</methodResponse>\n",
            value
        )
    }

    /// Answers calls from a script and records what was sent where.
    struct Scripted {
        answers: Mutex<VecDeque<String>>,
        sent: Mutex<Vec<(String, String)>>,
    }

    impl Scripted {
        fn new(answers: Vec<String>) -> Arc<Scripted> {
            Arc::new(Scripted {
                answers: Mutex::new(answers.into_iter().collect()),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self, index: usize) -> (String, String) {
            self.sent.lock().unwrap()[index].clone()
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn post(&self, url: &Uri, body: String) -> Result<String> {
            self.sent.lock().unwrap().push((url.to_string(), body));
            Ok(self
                .answers
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted answer left"))
        }
    }

    fn config() -> Config {
        Config::new("http://localhost:8069/", "odoo14", "admin", "s3cret")
    }

    async fn session(answers: Vec<String>) -> (Odoo, Arc<Scripted>) {
        let mut script = vec![VERSION.to_string(), ok("<value><int>2</int></value>")];
        script.extend(answers);
        let transport = Scripted::new(script);
        let odoo = Odoo::connect_with(config(), transport.clone()).await.unwrap();
        (odoo, transport)
    }

    #[tokio::test]
    async fn test_connect_authenticates() {
        let (odoo, transport) = session(Vec::new()).await;

        assert_eq!(2, odoo.uid());
        assert_eq!("14.0", odoo.server_version().server_version);
        assert_eq!(1, odoo.server_version().protocol_version);
        assert_eq!("odoo14", odoo.database());
        assert_eq!("admin", odoo.username());
        assert_eq!("http://localhost:8069/", odoo.hostname());

        let (url, body) = transport.sent(0);
        assert_eq!("http://localhost:8069/xmlrpc/2/common", url);
        assert!(body.contains("<methodName>version</methodName>"));

        let (url, body) = transport.sent(1);
        assert_eq!("http://localhost:8069/xmlrpc/2/common", url);
        assert!(body.contains(
            "<params><param><value><string>odoo14</string></value></param>\
             <param><value><string>admin</string></value></param>\
             <param><value><string>s3cret</string></value></param>\
             <param><value><struct></struct></value></param></params>"
        ));
        assert!(!format!("{:?}", odoo).contains("s3cret"));
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_credentials() {
        let denied = ok("<value><boolean>0</boolean></value>");
        let transport = Scripted::new(vec![VERSION.to_string(), denied]);

        let result = Odoo::connect_with(config(), transport).await;
        assert!(matches!(result, Err(Error::AuthenticationFailed { .. })));
    }

    #[tokio::test]
    async fn test_connect_rejects_odd_uid() {
        let odd = ok("<value><string>x</string></value>");
        let transport = Scripted::new(vec![VERSION.to_string(), odd]);

        match Odoo::connect_with(config(), transport).await {
            Err(Error::UnexpectedType { expected, found }) => {
                assert_eq!("int uid", expected);
                assert_eq!("string", found);
            }
            other => panic!("expected an unexpected type error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connect_surfaces_faults() {
        let fault = "<?xml version='1.0'?><methodResponse><fault><value><struct>\
                     <member><name>faultCode</name><value><int>1</int></value></member>\
                     <member><name>faultString</name><value><string>database \"nope\" does not exist</string></value></member>\
                     </struct></value></fault></methodResponse>";
        let transport = Scripted::new(vec![VERSION.to_string(), fault.to_string()]);

        match Odoo::connect_with(config(), transport).await {
            Err(Error::Fault(fault)) => assert!(fault.message.contains("does not exist")),
            other => panic!("expected a fault, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_search_sends_domain_and_options() {
        let (odoo, transport) = session(vec![ok(
            "<value><array><data><value><int>7</int></value><value><int>9</int></value></data></array></value>",
        )])
        .await;

        let domain = Domain::new().filter("is_company", Operator::Eq, true);
        let ids = odoo
            .search("res.partner", &domain, &SearchOptions::new().limit(2))
            .await
            .unwrap();
        assert_eq!(vec![7, 9], ids);

        let (url, body) = transport.sent(2);
        assert_eq!("http://localhost:8069/xmlrpc/2/object", url);
        assert!(body.contains("<methodName>execute_kw</methodName>"));
        assert!(body.contains(
            "<param><value><string>odoo14</string></value></param>\
             <param><value><int>2</int></value></param>\
             <param><value><string>s3cret</string></value></param>\
             <param><value><string>res.partner</string></value></param>\
             <param><value><string>search</string></value></param>"
        ));
        assert!(body.contains(
            "<param><value><array><data><value><array><data>\
             <value><array><data><value><string>is_company</string></value>\
             <value><string>=</string></value><value><boolean>1</boolean></value></data></array></value>\
             </data></array></value></data></array></value></param>"
        ));
        assert!(body.contains(
            "<param><value><struct><member><name>limit</name><value><int>2</int></value></member></struct></value></param>"
        ));
    }

    #[tokio::test]
    async fn test_search_count() {
        let (odoo, transport) = session(vec![ok("<value><int>42</int></value>")]).await;

        assert_eq!(42, odoo.search_count("res.partner", &Domain::new()).await.unwrap());
        let (_, body) = transport.sent(2);
        assert!(body.contains("<value><string>search_count</string></value>"));
        assert!(body.ends_with(
            "<param><value><array><data><value><array><data></data></array></value></data></array></value></param></params></methodCall>"
        ));
    }

    #[tokio::test]
    async fn test_read_returns_json_records() {
        let (odoo, transport) = session(vec![ok("<value><array><data><value><struct>\
             <member><name>id</name><value><int>7</int></value></member>\
             <member><name>name</name><value><string>Azure Interior</string></value></member>\
             <member><name>parent_id</name><value><boolean>0</boolean></value></member>\
             </struct></value></data></array></value>")])
        .await;

        let records = odoo.read("res.partner", &[7], &["name", "parent_id"]).await.unwrap();
        assert_eq!(1, records.len());
        assert_eq!(json!("Azure Interior"), records[0]["name"]);
        assert_eq!(json!(false), records[0]["parent_id"]);

        let (_, body) = transport.sent(2);
        assert!(body.contains(
            "<param><value><array><data><value><array><data><value><int>7</int></value></data></array></value></data></array></value></param>"
        ));
        assert!(body.contains("<member><name>fields</name><value><array><data>\
             <value><string>name</string></value><value><string>parent_id</string></value>\
             </data></array></value></member>"));
    }

    #[tokio::test]
    async fn test_search_read_as_typed_records() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Partner {
            id: i64,
            name: String,
        }

        let (odoo, transport) = session(vec![ok("<value><array><data>\
             <value><struct><member><name>id</name><value><int>3</int></value></member>\
             <member><name>name</name><value><string>Deco Addict</string></value></member></struct></value>\
             </data></array></value>")])
        .await;

        let partners: Vec<Partner> = odoo
            .search_read_as(
                "res.partner",
                &Domain::new().filter("name", Operator::ILike, "deco"),
                &["name"],
                &SearchOptions::new().order("name").offset(0),
            )
            .await
            .unwrap();
        assert_eq!(
            vec![Partner {
                id: 3,
                name: "Deco Addict".to_string()
            }],
            partners
        );

        let (_, body) = transport.sent(2);
        assert!(body.contains("<member><name>offset</name><value><int>0</int></value></member>"));
        assert!(body.contains("<member><name>order</name><value><string>name</string></value></member>"));
    }

    #[tokio::test]
    async fn test_fields_get() {
        let (odoo, transport) = session(vec![ok("<value><struct>\
             <member><name>name</name><value><struct>\
             <member><name>type</name><value><string>char</string></value></member>\
             <member><name>required</name><value><boolean>1</boolean></value></member>\
             </struct></value></member>\
             </struct></value>")])
        .await;

        let fields = odoo
            .fields_get("res.partner", &[], &["type", "required"])
            .await
            .unwrap();
        assert_eq!(json!({"type": "char", "required": true}), fields["name"]);

        let (_, body) = transport.sent(2);
        assert!(body.contains(
            "<value><string>fields_get</string></value></param><param><value><array><data></data></array></value></param>"
        ));
        assert!(body.contains("<member><name>attributes</name>"));
    }

    #[tokio::test]
    async fn test_create_write_unlink() {
        let (odoo, transport) = session(vec![
            ok("<value><int>51</int></value>"),
            ok("<value><boolean>1</boolean></value>"),
            ok("<value><boolean>1</boolean></value>"),
        ])
        .await;

        let values = Value::from_json(json!({"name": "New Partner"}));
        assert_eq!(51, odoo.create("res.partner", &values).await.unwrap());
        assert!(odoo
            .write("res.partner", &[51], &Value::from_json(json!({"name": "Renamed"})))
            .await
            .unwrap());
        assert!(odoo.unlink("res.partner", &[51]).await.unwrap());

        let (_, body) = transport.sent(2);
        assert!(body.contains(
            "<param><value><array><data><value><struct><member><name>name</name>\
             <value><string>New Partner</string></value></member></struct></value></data></array></value></param>"
        ));
        let (_, body) = transport.sent(3);
        assert!(body.contains(
            "<param><value><array><data><value><array><data><value><int>51</int></value></data></array></value>\
             <value><struct><member><name>name</name><value><string>Renamed</string></value></member></struct></value>\
             </data></array></value></param>"
        ));
        let (_, body) = transport.sent(4);
        assert!(body.contains("<value><string>unlink</string></value>"));
    }

    #[tokio::test]
    async fn test_name_get() {
        let (odoo, _) = session(vec![ok("<value><array><data>\
             <value><array><data><value><int>7</int></value><value><string>Azure Interior</string></value></data></array></value>\
             <value><array><data><value><int>9</int></value><value><string>Deco Addict</string></value></data></array></value>\
             </data></array></value>")])
        .await;

        let names = odoo.name_get("res.partner", &[7, 9]).await.unwrap();
        assert_eq!(
            vec![
                (7, "Azure Interior".to_string()),
                (9, "Deco Addict".to_string())
            ],
            names
        );
    }

    #[tokio::test]
    async fn test_wrong_result_shape_is_reported() {
        let (odoo, _) = session(vec![
            ok("<value><string>oops</string></value>"),
            ok("<value><array><data><value><int>7</int></value></data></array></value>"),
        ])
        .await;

        match odoo.search_count("res.partner", &Domain::new()).await {
            Err(Error::UnexpectedType { expected, found }) => {
                assert_eq!("int count", expected);
                assert_eq!("string", found);
            }
            other => panic!("expected a type error, got {:?}", other),
        }
        assert!(matches!(
            odoo.name_get("res.partner", &[7]).await,
            Err(Error::UnexpectedType { .. })
        ));
    }

    #[tokio::test]
    async fn test_access_error_fault() {
        let fault = "<?xml version='1.0'?><methodResponse><fault><value><struct>\
                     <member><name>faultCode</name><value><int>4</int></value></member>\
                     <member><name>faultString</name><value><string>You are not allowed to modify this document</string></value></member>\
                     </struct></value></fault></methodResponse>";
        let (odoo, _) = session(vec![fault.to_string()]).await;

        match odoo.unlink("res.users", &[1]).await {
            Err(Error::Fault(fault)) => assert_eq!(xmlrpc::FaultKind::AccessError, fault.kind()),
            other => panic!("expected a fault, got {:?}", other),
        }
    }
}
