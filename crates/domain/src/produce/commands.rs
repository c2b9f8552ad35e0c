//! Produce commands.

use chrono::{DateTime, Utc};
use common::{AggregateId, CommandId};
use serde::{Deserialize, Serialize};

use crate::command::Command;

use super::{FarmerId, Price};

/// Routing discriminator for produce commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    RegisterProduce,
    UpdateQuality,
    UpdatePrice,
    DeactivateProduce,
}

impl CommandKind {
    /// Every kind, in declaration order.
    pub const ALL: [CommandKind; 4] = [
        CommandKind::RegisterProduce,
        CommandKind::UpdateQuality,
        CommandKind::UpdatePrice,
        CommandKind::DeactivateProduce,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::RegisterProduce => "RegisterProduce",
            CommandKind::UpdateQuality => "UpdateQuality",
            CommandKind::UpdatePrice => "UpdatePrice",
            CommandKind::DeactivateProduce => "DeactivateProduce",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command to register new produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterProduce {
    #[serde(default)]
    pub command_id: CommandId,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub produce_id: AggregateId,
    pub farmer_id: FarmerId,
    pub origin: String,
    pub quality: String,
    pub initial_price: Price,
}

impl RegisterProduce {
    /// Creates a registration for a new, randomly chosen produce id.
    pub fn new(
        farmer_id: impl Into<FarmerId>,
        origin: impl Into<String>,
        quality: impl Into<String>,
        initial_price: Price,
    ) -> Self {
        Self {
            command_id: CommandId::new(),
            timestamp: Utc::now(),
            produce_id: AggregateId::new(),
            farmer_id: farmer_id.into(),
            origin: origin.into(),
            quality: quality.into(),
            initial_price,
        }
    }

    /// Targets a caller-chosen produce id.
    pub fn with_produce_id(mut self, produce_id: AggregateId) -> Self {
        self.produce_id = produce_id;
        self
    }
}

/// Command to change the quality grade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuality {
    #[serde(default)]
    pub command_id: CommandId,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    pub produce_id: AggregateId,
    pub new_quality: String,
    pub updater_id: String,
}

impl UpdateQuality {
    pub fn new(
        produce_id: AggregateId,
        new_quality: impl Into<String>,
        updater_id: impl Into<String>,
    ) -> Self {
        Self {
            command_id: CommandId::new(),
            timestamp: Utc::now(),
            produce_id,
            new_quality: new_quality.into(),
            updater_id: updater_id.into(),
        }
    }
}

/// Command to change the current price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePrice {
    #[serde(default)]
    pub command_id: CommandId,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    pub produce_id: AggregateId,
    pub new_price: Price,
    pub updater_id: String,
}

impl UpdatePrice {
    pub fn new(produce_id: AggregateId, new_price: Price, updater_id: impl Into<String>) -> Self {
        Self {
            command_id: CommandId::new(),
            timestamp: Utc::now(),
            produce_id,
            new_price,
            updater_id: updater_id.into(),
        }
    }
}

/// Command to take produce off the market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeactivateProduce {
    #[serde(default)]
    pub command_id: CommandId,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    pub produce_id: AggregateId,
}

impl DeactivateProduce {
    pub fn new(produce_id: AggregateId) -> Self {
        Self {
            command_id: CommandId::new(),
            timestamp: Utc::now(),
            produce_id,
        }
    }
}

/// Any produce command, tagged by kind on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ProduceCommand {
    RegisterProduce(RegisterProduce),
    UpdateQuality(UpdateQuality),
    UpdatePrice(UpdatePrice),
    DeactivateProduce(DeactivateProduce),
}

impl Command for ProduceCommand {
    type Kind = CommandKind;

    fn kind(&self) -> CommandKind {
        match self {
            ProduceCommand::RegisterProduce(_) => CommandKind::RegisterProduce,
            ProduceCommand::UpdateQuality(_) => CommandKind::UpdateQuality,
            ProduceCommand::UpdatePrice(_) => CommandKind::UpdatePrice,
            ProduceCommand::DeactivateProduce(_) => CommandKind::DeactivateProduce,
        }
    }

    fn command_id(&self) -> CommandId {
        match self {
            ProduceCommand::RegisterProduce(cmd) => cmd.command_id,
            ProduceCommand::UpdateQuality(cmd) => cmd.command_id,
            ProduceCommand::UpdatePrice(cmd) => cmd.command_id,
            ProduceCommand::DeactivateProduce(cmd) => cmd.command_id,
        }
    }

    fn aggregate_id(&self) -> AggregateId {
        match self {
            ProduceCommand::RegisterProduce(cmd) => cmd.produce_id,
            ProduceCommand::UpdateQuality(cmd) => cmd.produce_id,
            ProduceCommand::UpdatePrice(cmd) => cmd.produce_id,
            ProduceCommand::DeactivateProduce(cmd) => cmd.produce_id,
        }
    }
}

impl From<RegisterProduce> for ProduceCommand {
    fn from(cmd: RegisterProduce) -> Self {
        ProduceCommand::RegisterProduce(cmd)
    }
}

impl From<UpdateQuality> for ProduceCommand {
    fn from(cmd: UpdateQuality) -> Self {
        ProduceCommand::UpdateQuality(cmd)
    }
}

impl From<UpdatePrice> for ProduceCommand {
    fn from(cmd: UpdatePrice) -> Self {
        ProduceCommand::UpdatePrice(cmd)
    }
}

impl From<DeactivateProduce> for ProduceCommand {
    fn from(cmd: DeactivateProduce) -> Self {
        ProduceCommand::DeactivateProduce(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_is_an_explicit_tag() {
        let id = AggregateId::new();
        let command: ProduceCommand = UpdatePrice::new(id, Price::new(200), "farmer-1").into();

        assert_eq!(command.kind(), CommandKind::UpdatePrice);
        assert_eq!(command.aggregate_id(), id);

        let json = serde_json::to_value(&command).unwrap();
        assert_eq!(json["kind"], "UpdatePrice");
        assert_eq!(json["newPrice"], 200);
        assert_eq!(json["produceId"], id.to_string());
        assert!(json["commandId"].is_string());
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn parse_wire_command() {
        let id = AggregateId::new();
        let command: ProduceCommand = serde_json::from_value(json!({
            "kind": "UpdateQuality",
            "commandId": "5f0c7b5e-2f7d-4c55-9d6c-2f1a6f3d9b01",
            "timestamp": "2024-05-01T12:00:00Z",
            "produceId": id.to_string(),
            "newQuality": "Organic",
            "updaterId": "farmer-1"
        }))
        .unwrap();

        match command {
            ProduceCommand::UpdateQuality(cmd) => {
                assert_eq!(cmd.produce_id, id);
                assert_eq!(cmd.new_quality, "Organic");
                assert_eq!(
                    cmd.command_id.to_string(),
                    "5f0c7b5e-2f7d-4c55-9d6c-2f1a6f3d9b01"
                );
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn register_defaults_identity_fields() {
        let command: ProduceCommand = serde_json::from_value(json!({
            "kind": "RegisterProduce",
            "farmerId": "farmer-1",
            "origin": "CA",
            "quality": "Grade A",
            "initialPrice": 150
        }))
        .unwrap();

        assert_eq!(command.kind(), CommandKind::RegisterProduce);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let result: Result<ProduceCommand, _> =
            serde_json::from_value(json!({"kind": "DeleteProduce", "produceId": "x"}));
        assert!(result.is_err());
    }

    #[test]
    fn all_kinds_are_distinct() {
        let names: std::collections::HashSet<_> =
            CommandKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(names.len(), CommandKind::ALL.len());
    }
}
