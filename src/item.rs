use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

type Extra = serde_json::Map<String, serde_json::Value>;

/// A field the service may leave out, send as `null` or send with a value.
///
/// `None` is skipped when serializing, `Some(None)` is written back as `null`.
pub type Nullable<T> = Option<Option<T>>;

fn nullable<'de, T, D>(deserializer: D) -> Result<Nullable<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

macro_rules! nullable_field {
    ($($field:ident, $set:ident: $ty:ty => $target:ty);* $(;)?) => {
        $(
            pub fn $field(&self) -> Option<&$target> {
                self.$field.as_ref().and_then(|v| v.as_deref())
            }

            /// Sets the field, `None` sends it as `null`
            pub fn $set(&mut self, value: impl Into<Option<$ty>>) {
                self.$field = Some(value.into());
            }
        )*
    };
}

/// An item document, as returned by the service.
///
/// Anything the service sends that isn't a named field ends up in `extra`, so
/// a fetched item can be changed and sent back with [`VWflow::update_item`]
/// without losing data. Named fields remember whether they were missing or
/// `null`, see [`Nullable`].
///
/// [`VWflow::update_item`]: crate::VWflow::update_item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub url: Nullable<String>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub name: Nullable<String>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub description: Nullable<String>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub tags: Nullable<Vec<String>>,

    /// Custom metadata
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub schema: Nullable<serde_json::Value>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub workflow: Nullable<Workflow>,

    #[serde(
        rename = "type",
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Nullable<String>,

    /// In seconds, kept as the service wrote it (`152` stays an integer)
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub duration: Nullable<serde_json::Number>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub embed_code: Nullable<String>,

    /// Path fragment for streaming
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub path: Nullable<String>,

    /// Path fragment for direct download
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub direct_path: Nullable<String>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Nullable<i64>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub snapshots: Nullable<Vec<Snapshot>>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub created: Nullable<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl Item {
    nullable_field! {
        url, set_url: String => str;
        name, set_name: String => str;
        description, set_description: String => str;
        tags, set_tags: Vec<String> => [String];
        kind, set_kind: String => str;
        embed_code, set_embed_code: String => str;
        path, set_path: String => str;
        direct_path, set_direct_path: String => str;
        snapshots, set_snapshots: Vec<Snapshot> => [Snapshot];
        created, set_created: String => str;
    }

    pub fn schema(&self) -> Option<&serde_json::Value> {
        self.schema.as_ref()?.as_ref()
    }

    pub fn set_schema(&mut self, schema: impl Into<Option<serde_json::Value>>) {
        self.schema = Some(schema.into());
    }

    pub fn workflow(&self) -> Option<&Workflow> {
        self.workflow.as_ref()?.as_ref()
    }

    /// Duration in seconds
    pub fn duration(&self) -> Option<f64> {
        self.duration.as_ref()?.as_ref()?.as_f64()
    }

    pub fn snapshot_id(&self) -> Option<i64> {
        self.snapshot_id.flatten()
    }

    /// The currently selected snapshot, if the service told us about it
    pub fn selected_snapshot(&self) -> Option<&Snapshot> {
        let id = self.snapshot_id()?;
        self.snapshots()?.iter().find(|s| s.id == id)
    }

    /// Snapshots that could be selected instead of the current one
    pub fn other_snapshots(&self) -> impl Iterator<Item = &Snapshot> + '_ {
        let selected = self.snapshot_id();
        self.snapshots()
            .unwrap_or_default()
            .iter()
            .filter(move |s| Some(s.id) != selected)
    }

    pub fn is_finished(&self) -> bool {
        self.workflow()
            .map(Workflow::is_finished)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub status: Nullable<WorkflowStatus>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub curr_action: Nullable<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl Workflow {
    pub fn status(&self) -> Option<&WorkflowStatus> {
        self.status.as_ref()?.as_ref()
    }

    pub fn curr_action(&self) -> Option<&str> {
        self.curr_action.as_ref()?.as_deref()
    }

    /// Whether the status is `Completed` or `Failed`. A missing status isn't finished.
    pub fn is_finished(&self) -> bool {
        self.status()
            .map(WorkflowStatus::is_finished)
            .unwrap_or_default()
    }
}

/// Where the service's processing pipeline is at for an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WorkflowStatus {
    Completed,
    Failed,
    /// Anything else the service reports, kept verbatim
    Other(String),
}

impl WorkflowStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for WorkflowStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Completed" => Self::Completed,
            "Failed" => Self::Failed,
            _ => Self::Other(s),
        }
    }
}

impl From<WorkflowStatus> for String {
    fn from(status: WorkflowStatus) -> Self {
        match status {
            WorkflowStatus::Other(s) => s,
            status => status.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate poster/thumbnail image for an item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: i64,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub download: Nullable<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl Snapshot {
    /// Where the image can be downloaded from
    pub fn download(&self) -> Option<&str> {
        self.download.as_ref()?.as_deref()
    }
}

/// One page of an items query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemList {
    #[serde(default)]
    pub count: u64,

    /// Continuation reference, an opaque url for the next page
    #[serde(default)]
    pub next: Option<String>,

    #[serde(default)]
    pub previous: Option<String>,

    #[serde(default)]
    pub results: Vec<Item>,
}

/// Query-string arguments for an items query.
///
/// Values are put into the query string as-is, escaping them is up to the
/// caller (e.g. `tags("news,scoop")`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemsQuery {
    params: Vec<(String, String)>,
}

macro_rules! query_param {
    ($($ident:ident => $key:expr);* $(;)?) => {
        $(
            pub fn $ident(self, value: impl ToString) -> Self {
                self.param($key, value)
            }
        )*
    };
}

impl ItemsQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an arbitrary key/value pair
    pub fn param(mut self, key: impl ToString, value: impl ToString) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    query_param! {
        kind            => "type";
        privacy         => "privacy";
        workflow_status => "workflow_status";
        created_after   => "created_after";
        tags            => "tags";
        search          => "search";
        page            => "page";
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn has_page(&self) -> bool {
        self.params
            .iter()
            .any(|(k, _)| k.eq_ignore_ascii_case("page"))
    }
}

impl<K, V> std::iter::FromIterator<(K, V)> for ItemsQuery
where
    K: ToString,
    V: ToString,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::default(), |q, (k, v)| q.param(k, v))
    }
}

/// Everything needed to create an item by uploading a file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewItem {
    pub path: PathBuf,
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub schema: Option<serde_json::Value>,
    pub wprofile_id: Option<String>,
    pub client_data: Option<String>,
    pub input_data: Option<String>,
    pub producer: Option<String>,
    pub language: Option<String>,
    /// Addresses to mail once the workflow is done
    pub send_mail_to: Vec<String>,
}

impl NewItem {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn name(mut self, name: impl ToString) -> Self {
        self.name.replace(name.to_string());
        self
    }

    pub fn description(mut self, description: impl ToString) -> Self {
        self.description.replace(description.to_string());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.tags.extend(tags.into_iter().map(|s| s.to_string()));
        self
    }

    pub fn schema(mut self, schema: serde_json::Value) -> Self {
        self.schema.replace(schema);
        self
    }

    pub fn wprofile_id(mut self, id: impl ToString) -> Self {
        self.wprofile_id.replace(id.to_string());
        self
    }

    pub fn client_data(mut self, data: impl ToString) -> Self {
        self.client_data.replace(data.to_string());
        self
    }

    pub fn input_data(mut self, data: impl ToString) -> Self {
        self.input_data.replace(data.to_string());
        self
    }

    pub fn producer(mut self, producer: impl ToString) -> Self {
        self.producer.replace(producer.to_string());
        self
    }

    pub fn language(mut self, language: impl ToString) -> Self {
        self.language.replace(language.to_string());
        self
    }

    pub fn send_mail_to<I, S>(mut self, recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.send_mail_to
            .extend(recipients.into_iter().map(|s| s.to_string()));
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The JSON encoded `data` field, if there's anything to put in it
    pub fn data(&self) -> Option<String> {
        #[derive(Serialize)]
        struct Tasks<'a> {
            send_mail_to: &'a [String],
        }

        #[derive(Serialize)]
        struct Data<'a> {
            #[serde(skip_serializing_if = "<[String]>::is_empty")]
            tags: &'a [String],
            #[serde(skip_serializing_if = "Option::is_none")]
            schema: Option<&'a serde_json::Value>,
            #[serde(skip_serializing_if = "Option::is_none")]
            producer: Option<&'a str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            language: Option<&'a str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            tasks: Option<Tasks<'a>>,
        }

        fn non_empty(s: &Option<String>) -> Option<&str> {
            s.as_deref().filter(|s| !s.is_empty())
        }

        fn is_empty_json(value: &serde_json::Value) -> bool {
            use serde_json::Value;
            match value {
                Value::Null => true,
                Value::Object(map) => map.is_empty(),
                Value::Array(list) => list.is_empty(),
                _ => false,
            }
        }

        let data = Data {
            tags: &self.tags,
            schema: self.schema.as_ref().filter(|s| !is_empty_json(s)),
            producer: non_empty(&self.producer),
            language: non_empty(&self.language),
            tasks: if self.send_mail_to.is_empty() {
                None
            } else {
                Some(Tasks {
                    send_mail_to: &self.send_mail_to,
                })
            },
        };

        if data.tags.is_empty()
            && data.schema.is_none()
            && data.producer.is_none()
            && data.language.is_none()
            && data.tasks.is_none()
        {
            return None;
        }

        serde_json::to_string(&data).ok()
    }
}
