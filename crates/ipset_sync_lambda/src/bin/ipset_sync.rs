use aws_sdk_wafv2::types::Scope;
use ipset_sync_lambda::adapters::ip_set::{IpSetService, IpSetSnapshot, IpSetUpdate};
use ipset_sync_lambda::adapters::object_store::ObjectSource;
use ipset_sync_lambda::handlers::sync::{IpSetSynchronizer, SyncResponse};
use ipset_sync_lambda::runtime::config::SyncConfig;
use ipset_sync_lambda::runtime::contract::IpSetIdentity;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;

struct S3ObjectSource {
    s3_client: aws_sdk_s3::Client,
}

impl ObjectSource for S3ObjectSource {
    fn fetch_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, String> {
        let bucket = bucket.to_string();
        let object_key = key.to_string();
        let client = self.s3_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let output = client
                    .get_object()
                    .bucket(bucket)
                    .key(object_key)
                    .send()
                    .await
                    .map_err(|error| format!("failed to fetch object from s3: {error}"))?;
                output
                    .body
                    .collect()
                    .await
                    .map(|data| data.into_bytes().to_vec())
                    .map_err(|error| format!("failed to read s3 object body: {error}"))
            })
        })
    }
}

struct WafIpSetService {
    waf_client: aws_sdk_wafv2::Client,
}

impl IpSetService for WafIpSetService {
    fn get_ip_set(&self, ip_set: &IpSetIdentity) -> Result<IpSetSnapshot, String> {
        let ip_set = ip_set.clone();
        let client = self.waf_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let output = client
                    .get_ip_set()
                    .name(ip_set.name)
                    .id(ip_set.id)
                    .scope(Scope::from(ip_set.scope.as_str()))
                    .send()
                    .await
                    .map_err(|error| format!("failed to get wafv2 ip set: {error}"))?;
                Ok(IpSetSnapshot {
                    lock_token: output.lock_token().map(str::to_string),
                    addresses: output
                        .ip_set()
                        .map(|value| value.addresses().to_vec())
                        .unwrap_or_default(),
                })
            })
        })
    }

    fn update_ip_set(
        &self,
        ip_set: &IpSetIdentity,
        addresses: &[String],
        lock_token: &str,
    ) -> Result<IpSetUpdate, String> {
        let ip_set = ip_set.clone();
        let addresses = addresses.to_vec();
        let lock_token = lock_token.to_string();
        let client = self.waf_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .update_ip_set()
                    .name(ip_set.name)
                    .scope(Scope::from(ip_set.scope.as_str()))
                    .id(ip_set.id)
                    .set_addresses(Some(addresses))
                    .lock_token(lock_token)
                    .send()
                    .await
                    .map(|output| IpSetUpdate {
                        next_lock_token: output.next_lock_token().map(str::to_string),
                    })
                    .map_err(|error| format!("failed to update wafv2 ip set: {error}"))
            })
        })
    }
}

type Synchronizer = IpSetSynchronizer<S3ObjectSource, WafIpSetService>;

async fn handle_request(
    event: LambdaEvent<Value>,
    synchronizer: &Synchronizer,
) -> Result<SyncResponse, Error> {
    synchronizer
        .handle_notification_event(event.payload)
        .map_err(|error| Error::from(error.to_string()))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = SyncConfig::from_env()?;

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let synchronizer = IpSetSynchronizer::new(
        config,
        S3ObjectSource {
            s3_client: aws_sdk_s3::Client::new(&aws_config),
        },
        WafIpSetService {
            waf_client: aws_sdk_wafv2::Client::new(&aws_config),
        },
    );

    lambda_runtime::run(service_fn(|event: LambdaEvent<Value>| {
        handle_request(event, &synchronizer)
    }))
    .await
}
