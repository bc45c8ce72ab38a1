/*!
vwflow. a client for the VWflow video workflow service

Create, query, update and delete items (uploaded media and the state of
their workflow), and sign direct uploads with a workflow profile's secret.

```no_run
# async fn run() -> Result<(), vwflow::RemoteError> {
use vwflow::{ItemsQuery, NewItem, VWflow};

let client = VWflow::new("me@example.com", "hunter2");

let item = client
    .create_item(&NewItem::new("/path/to/video.mp4").name("Video Title"))
    .await?;

let list = client.list_items(&ItemsQuery::new().search("video")).await?;
for item in &list.results {
    println!("{}: {:?}", item.id, item.name());
}

client.delete_item(&item.id).await?;
# Ok(())
# }
```
*/

/// Configuration
pub mod config;

/// Signing direct uploads
pub mod hmac;

/// Item documents and query types
pub mod item;

mod client;
mod error;
mod http;

pub use client::VWflow;
pub use config::{ClientConfig, Config, Verify};
pub use error::{message_from_body, RemoteError, FALLBACK_MESSAGE};
pub use hmac::{HmacToken, HmacUpload};
pub use item::{Item, ItemList, ItemsQuery, NewItem, Snapshot, Workflow, WorkflowStatus};
