//! EC2 hive via the `aws` CLI

use async_trait::async_trait;
use serde::Deserialize;

use bees_core::{BeeInstance, Hive, HiveError, LaunchRequest};

use crate::aws::{AwsCli, AwsError};

/// Name tag put on every launched bee
pub const BEE_NAME: &str = "a bee!";

/// Region of an availability zone (`us-east-1d` → `us-east-1`)
pub fn region_of(zone: &str) -> &str {
    match zone.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() && idx > 0 => &zone[..idx],
        _ => zone,
    }
}

/// Hive backed by EC2
#[derive(Debug, Clone)]
pub struct Ec2Hive {
    cli: AwsCli,
}

impl Ec2Hive {
    /// Hive in `region`
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            cli: AwsCli::new(region),
        }
    }
}

impl From<AwsError> for HiveError {
    fn from(err: AwsError) -> Self {
        HiveError::Call(err.to_string())
    }
}

/// Arguments of the `run-instances` call for `request`
pub fn run_instances_args(request: &LaunchRequest) -> Vec<String> {
    vec![
        "ec2".into(),
        "run-instances".into(),
        "--image-id".into(),
        request.image_id.clone(),
        "--count".into(),
        request.count.to_string(),
        "--key-name".into(),
        request.key_name.clone(),
        "--security-groups".into(),
        request.group.clone(),
        "--instance-type".into(),
        request.instance_type.clone(),
        "--placement".into(),
        format!("AvailabilityZone={}", request.zone),
    ]
}

fn with_ids<'a>(prefix: &[&'a str], ids: &'a [String]) -> Vec<&'a str> {
    let mut args = prefix.to_vec();
    args.extend(ids.iter().map(String::as_str));
    args
}

#[async_trait]
impl Hive for Ec2Hive {
    async fn launch(&self, request: &LaunchRequest) -> Result<Vec<BeeInstance>, HiveError> {
        tracing::info!(
            count = request.count,
            image = %request.image_id,
            zone = %request.zone,
            "Attempting to call up bees"
        );

        let args = run_instances_args(request);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let ids = parse_run_instances(&self.cli.run(&args).await?)?;
        if ids.is_empty() {
            return Err(HiveError::Response("run-instances returned no instances".into()));
        }

        tracing::info!(bees = ids.len(), "Waiting for bees to load their machine guns");
        self.cli
            .run(&with_ids(&["ec2", "wait", "instance-running", "--instance-ids"], &ids))
            .await?;

        let tag = format!("Key=Name,Value={BEE_NAME}");
        let mut tag_args = with_ids(&["ec2", "create-tags", "--resources"], &ids);
        tag_args.extend(["--tags", tag.as_str()]);
        if let Err(e) = self.cli.run(&tag_args).await {
            // untagged bees still fight
            tracing::warn!(error = %e, "Failed to tag bees");
        }

        self.describe(&ids).await
    }

    async fn describe(&self, ids: &[String]) -> Result<Vec<BeeInstance>, HiveError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let json = self
            .cli
            .run(&with_ids(&["ec2", "describe-instances", "--instance-ids"], ids))
            .await?;
        parse_describe_instances(&json)
    }

    async fn terminate(&self, ids: &[String]) -> Result<Vec<String>, HiveError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let json = self
            .cli
            .run(&with_ids(&["ec2", "terminate-instances", "--instance-ids"], ids))
            .await?;
        parse_terminate_instances(&json)
    }
}

// ============================================================================
// Response parsing
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RunInstancesOutput {
    #[serde(default)]
    instances: Vec<InstanceDoc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstancesOutput {
    #[serde(default)]
    reservations: Vec<ReservationDoc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ReservationDoc {
    #[serde(default)]
    instances: Vec<InstanceDoc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstanceDoc {
    instance_id: String,
    #[serde(default)]
    state: Option<StateDoc>,
    #[serde(default)]
    public_dns_name: Option<String>,
    #[serde(default)]
    public_ip_address: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StateDoc {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TerminateInstancesOutput {
    #[serde(default)]
    terminating_instances: Vec<TerminatingDoc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TerminatingDoc {
    instance_id: String,
}

impl From<InstanceDoc> for BeeInstance {
    fn from(doc: InstanceDoc) -> Self {
        let address = doc
            .public_dns_name
            .filter(|name| !name.is_empty())
            .or(doc.public_ip_address.filter(|ip| !ip.is_empty()));
        BeeInstance {
            id: doc.instance_id,
            state: doc.state.map(|s| s.name).unwrap_or_else(|| "unknown".into()),
            address,
        }
    }
}

fn decode<'a, T: Deserialize<'a>>(call: &str, json: &'a str) -> Result<T, HiveError> {
    serde_json::from_str(json).map_err(|e| HiveError::Response(format!("{call}: {e}")))
}

/// Instance ids from a `run-instances` response
pub fn parse_run_instances(json: &str) -> Result<Vec<String>, HiveError> {
    let out: RunInstancesOutput = decode("run-instances", json)?;
    Ok(out.instances.into_iter().map(|i| i.instance_id).collect())
}

/// Instances from a `describe-instances` response
pub fn parse_describe_instances(json: &str) -> Result<Vec<BeeInstance>, HiveError> {
    let out: DescribeInstancesOutput = decode("describe-instances", json)?;
    Ok(out
        .reservations
        .into_iter()
        .flat_map(|r| r.instances)
        .map(BeeInstance::from)
        .collect())
}

/// Ids accepted by a `terminate-instances` call
pub fn parse_terminate_instances(json: &str) -> Result<Vec<String>, HiveError> {
    let out: TerminateInstancesOutput = decode("terminate-instances", json)?;
    Ok(out
        .terminating_instances
        .into_iter()
        .map(|i| i.instance_id)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_of_zone() {
        assert_eq!(region_of("us-east-1d"), "us-east-1");
        assert_eq!(region_of("eu-west-2a"), "eu-west-2");
        assert_eq!(region_of("us-east-1"), "us-east-1");
        assert_eq!(region_of(""), "");
    }

    #[test]
    fn test_run_instances_args() {
        let request = LaunchRequest {
            count: 5,
            group: "default".into(),
            zone: "us-east-1d".into(),
            image_id: "ami-ff17fb96".into(),
            key_name: "frontend".into(),
            instance_type: "t1.micro".into(),
        };
        assert_eq!(
            run_instances_args(&request),
            vec![
                "ec2",
                "run-instances",
                "--image-id",
                "ami-ff17fb96",
                "--count",
                "5",
                "--key-name",
                "frontend",
                "--security-groups",
                "default",
                "--instance-type",
                "t1.micro",
                "--placement",
                "AvailabilityZone=us-east-1d",
            ]
        );
    }

    #[test]
    fn test_parse_run_instances() {
        let json = r#"{
            "Groups": [],
            "Instances": [
                {"InstanceId": "i-0a1", "State": {"Code": 0, "Name": "pending"}},
                {"InstanceId": "i-0a2", "State": {"Code": 0, "Name": "pending"}}
            ],
            "OwnerId": "123456789012",
            "ReservationId": "r-0abc"
        }"#;
        assert_eq!(parse_run_instances(json).unwrap(), vec!["i-0a1", "i-0a2"]);
    }

    #[test]
    fn test_parse_describe_instances() {
        let json = r#"{
            "Reservations": [
                {"Instances": [
                    {"InstanceId": "i-0a1", "State": {"Code": 16, "Name": "running"},
                     "PublicDnsName": "ec2-54-1-2-3.compute-1.amazonaws.com",
                     "PublicIpAddress": "54.1.2.3"}
                ]},
                {"Instances": [
                    {"InstanceId": "i-0a2", "State": {"Code": 0, "Name": "pending"},
                     "PublicDnsName": ""}
                ]}
            ]
        }"#;
        let instances = parse_describe_instances(json).unwrap();

        assert_eq!(instances.len(), 2);
        assert_eq!(
            instances[0].address.as_deref(),
            Some("ec2-54-1-2-3.compute-1.amazonaws.com")
        );
        assert!(instances[0].is_ready());
        assert_eq!(instances[1].state, "pending");
        assert_eq!(instances[1].address, None);
        assert!(!instances[1].is_ready());
    }

    #[test]
    fn test_ip_used_when_dns_is_blank() {
        let json = r#"{"Reservations": [{"Instances": [
            {"InstanceId": "i-0a1", "State": {"Name": "running"},
             "PublicDnsName": "", "PublicIpAddress": "54.1.2.3"}
        ]}]}"#;
        let instances = parse_describe_instances(json).unwrap();
        assert_eq!(instances[0].address.as_deref(), Some("54.1.2.3"));
    }

    #[test]
    fn test_parse_terminate_instances() {
        let json = r#"{"TerminatingInstances": [
            {"InstanceId": "i-0a1", "CurrentState": {"Code": 32, "Name": "shutting-down"}},
            {"InstanceId": "i-0a2", "CurrentState": {"Code": 32, "Name": "shutting-down"}}
        ]}"#;
        assert_eq!(parse_terminate_instances(json).unwrap(), vec!["i-0a1", "i-0a2"]);
    }

    #[test]
    fn test_garbage_response_is_error() {
        assert!(matches!(
            parse_describe_instances("not json"),
            Err(HiveError::Response(_))
        ));
    }
}
