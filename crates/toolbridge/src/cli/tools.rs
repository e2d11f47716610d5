//! One-shot tool commands: list, describe, invoke.

use argh::FromArgs;
use serde_json::{Map, Value};

use super::{load_config, print_result, CliError, Result};
use crate::bridge::Bridge;
use crate::validation::parse_key_value;

/// Print the list of backend tools
#[derive(FromArgs)]
#[argh(subcommand, name = "list")]
pub struct ListCommand {
    /// config file (default: ~/.toolbridge/config.yaml)
    #[argh(option, short = 'c')]
    config: Option<String>,
}

/// Print a tool's details and cache its parameter format
#[derive(FromArgs)]
#[argh(subcommand, name = "describe")]
pub struct DescribeCommand {
    /// tool identifier (TOOL_ID)
    #[argh(positional)]
    tool_id: String,

    /// config file (default: ~/.toolbridge/config.yaml)
    #[argh(option, short = 'c')]
    config: Option<String>,
}

/// Invoke a tool with KEY=VALUE arguments
#[derive(FromArgs)]
#[argh(subcommand, name = "invoke")]
pub struct InvokeCommand {
    /// tool identifier (TOOL_ID)
    #[argh(positional)]
    tool_id: String,

    /// argument as KEY=VALUE; VALUE is parsed as JSON when possible (repeatable)
    #[argh(option, short = 'a')]
    arg: Vec<String>,

    /// fetch the tool's parameter format before invoking
    #[argh(switch)]
    describe_first: bool,

    /// config file (default: ~/.toolbridge/config.yaml)
    #[argh(option, short = 'c')]
    config: Option<String>,
}

fn connect(config: Option<&str>) -> Result<Bridge> {
    let config = load_config(config)?;
    config.validate()?;
    Ok(Bridge::from_config(&config)?)
}

impl ListCommand {
    pub async fn run(self) -> Result<()> {
        let bridge = connect(self.config.as_deref())?;
        print_result(&bridge.list().await)
    }
}

impl DescribeCommand {
    pub async fn run(self) -> Result<()> {
        let bridge = connect(self.config.as_deref())?;
        print_result(&bridge.describe(&self.tool_id).await)
    }
}

impl InvokeCommand {
    pub async fn run(self) -> Result<()> {
        let args = parse_args(&self.arg)?;
        let bridge = connect(self.config.as_deref())?;

        if self.describe_first {
            let details = bridge.describe(&self.tool_id).await;
            if let Some(message) = super::error_message(&details) {
                return Err(CliError::Failed(message.to_string()));
            }
        }

        print_result(&bridge.invoke(&self.tool_id, &args).await)
    }
}

/// Collect `KEY=VALUE` arguments into a flat argument object.
fn parse_args(raw: &[String]) -> Result<Map<String, Value>> {
    raw.iter()
        .map(|arg| parse_key_value(arg).map_err(CliError::Failed))
        .collect()
}
