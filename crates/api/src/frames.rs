// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON request/response/notification frames of the north-bound API.
//!
//! A frame with an `id` expects a response; one without is a notification.
//! Method calls are adjacently tagged (`method` + `params`) so the same
//! envelope carries session methods, device methods, and the `x-p44-*`
//! extension surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dsuid::DsUid;
use crate::error::ErrorBody;

pub type ZoneId = u16;
pub type SceneNo = u8;

/// Color group of a device or behaviour. Wire format is the dS group number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DsGroup {
    Undefined,
    YellowLight,
    GreyShadow,
    BlueHeating,
    CyanAudio,
    MagentaVideo,
    RedSecurity,
    GreenAccess,
    BlackVariable,
}

impl DsGroup {
    pub const ALL: [DsGroup; 9] = [
        DsGroup::Undefined,
        DsGroup::YellowLight,
        DsGroup::GreyShadow,
        DsGroup::BlueHeating,
        DsGroup::CyanAudio,
        DsGroup::MagentaVideo,
        DsGroup::RedSecurity,
        DsGroup::GreenAccess,
        DsGroup::BlackVariable,
    ];

    pub fn number(&self) -> u8 {
        *self as u8
    }
}

impl From<DsGroup> for u8 {
    fn from(g: DsGroup) -> u8 {
        g as u8
    }
}

impl TryFrom<u8> for DsGroup {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        DsGroup::ALL.get(v as usize).copied().ok_or_else(|| format!("unknown group {v}"))
    }
}

/// Output channel type. `Default` addresses a device's primary channel
/// whatever its concrete type is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ChannelType {
    Default,
    Brightness,
    Hue,
    Saturation,
    ColorTemp,
    CieX,
    CieY,
    ShadePosition,
    ShadeAngle,
    AirFlowIntensity,
}

impl ChannelType {
    const ALL: [ChannelType; 10] = [
        ChannelType::Default,
        ChannelType::Brightness,
        ChannelType::Hue,
        ChannelType::Saturation,
        ChannelType::ColorTemp,
        ChannelType::CieX,
        ChannelType::CieY,
        ChannelType::ShadePosition,
        ChannelType::ShadeAngle,
        ChannelType::AirFlowIntensity,
    ];

    pub fn number(&self) -> u8 {
        *self as u8
    }
}

impl From<ChannelType> for u8 {
    fn from(c: ChannelType) -> u8 {
        c as u8
    }
}

impl TryFrom<u8> for ChannelType {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        ChannelType::ALL.get(v as usize).copied().ok_or_else(|| format!("unknown channel type {v}"))
    }
}

/// Dimming direction. Wire format is -1/0/1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum DimMode {
    Down,
    Stop,
    Up,
}

impl DimMode {
    pub fn inverse(&self) -> DimMode {
        match self {
            DimMode::Down => DimMode::Up,
            DimMode::Up => DimMode::Down,
            DimMode::Stop => DimMode::Stop,
        }
    }
}

impl From<DimMode> for i8 {
    fn from(m: DimMode) -> i8 {
        match m {
            DimMode::Down => -1,
            DimMode::Stop => 0,
            DimMode::Up => 1,
        }
    }
}

impl TryFrom<i8> for DimMode {
    type Error = String;

    fn try_from(v: i8) -> Result<Self, Self::Error> {
        match v {
            -1 => Ok(DimMode::Down),
            0 => Ok(DimMode::Stop),
            1 => Ok(DimMode::Up),
            other => Err(format!("invalid dim mode {other}")),
        }
    }
}

/// A value that may arrive as a single item or an array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }
}

/// Audience addressing common to all device-targeted notifications.
/// Exactly one of dSUID / itemSpec / zone+group addressing is expected;
/// zone 0 means all zones and a missing group means all groups.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Addressing {
    #[serde(rename = "dSUID", skip_serializing_if = "Option::is_none")]
    pub dsuid: Option<OneOrMany<DsUid>>,
    #[serde(rename = "x-p44-itemSpec", skip_serializing_if = "Option::is_none")]
    pub item_spec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<ZoneId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<DsGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelloParams {
    pub api_version: u16,
    #[serde(rename = "dSUID")]
    pub dsuid: DsUid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnounceVdcParams {
    #[serde(rename = "dSUID")]
    pub dsuid: DsUid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnounceDeviceParams {
    #[serde(rename = "dSUID")]
    pub dsuid: DsUid,
    #[serde(rename = "vdc_dSUID")]
    pub vdc_dsuid: DsUid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSceneParams {
    #[serde(flatten)]
    pub addressing: Addressing,
    pub scene: SceneNo,
    #[serde(default)]
    pub force: bool,
    /// Transition time override in seconds.
    #[serde(rename = "transitionTime", skip_serializing_if = "Option::is_none")]
    pub transition_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimChannelParams {
    #[serde(flatten)]
    pub addressing: Addressing,
    pub mode: DimMode,
    #[serde(default)]
    pub channel: Option<ChannelType>,
    #[serde(rename = "channelId", skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub area: i8,
    /// When false, the caller promises to repeat the dim command and the
    /// automatic stop timeout is not armed.
    #[serde(rename = "autoStop", default = "default_true")]
    pub auto_stop: bool,
    /// Dim rate override in units per millisecond; only values > 0 are
    /// honored, negative values are rejected.
    #[serde(rename = "dimPerMS", skip_serializing_if = "Option::is_none")]
    pub dim_per_ms: Option<f64>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneTargetParams {
    #[serde(flatten)]
    pub addressing: Addressing,
    pub scene: SceneNo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetControlValueParams {
    #[serde(flatten)]
    pub addressing: Addressing,
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetOutputChannelValueParams {
    #[serde(flatten)]
    pub addressing: Addressing,
    #[serde(default)]
    pub channel: Option<ChannelType>,
    #[serde(rename = "channelId", skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    pub value: f64,
    #[serde(rename = "transitionTime", skip_serializing_if = "Option::is_none")]
    pub transition_time: Option<f64>,
    #[serde(default)]
    pub area: i8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveParams {
    #[serde(rename = "dSUID")]
    pub dsuid: DsUid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptExecParams {
    pub script: String,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryScenesParams {
    #[serde(rename = "dSUID")]
    pub dsuid: DsUid,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryGroupsParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<ZoneId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerParams {
    #[serde(rename = "triggerID")]
    pub trigger_id: u32,
    #[serde(rename = "triggerParam", skip_serializing_if = "Option::is_none")]
    pub trigger_param: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetIdentityParams {
    #[serde(rename = "dSUID", skip_serializing_if = "Option::is_none")]
    pub dsuid: Option<DsUid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushNotificationParams {
    #[serde(rename = "dSUID")]
    pub dsuid: DsUid,
    pub properties: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetPropertyParams {
    #[serde(rename = "dSUID")]
    pub dsuid: DsUid,
    /// Property selection: object keys select properties, null selects
    /// the whole subtree.
    #[serde(default)]
    pub query: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetPropertyParams {
    #[serde(rename = "dSUID")]
    pub dsuid: DsUid,
    pub properties: Value,
}

/// All methods and notifications of the north-bound API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum MethodCall {
    #[serde(rename = "hello")]
    Hello(HelloParams),
    #[serde(rename = "bye")]
    Bye,
    #[serde(rename = "announcevdc")]
    AnnounceVdc(AnnounceVdcParams),
    #[serde(rename = "announcedevice")]
    AnnounceDevice(AnnounceDeviceParams),
    #[serde(rename = "callScene")]
    CallScene(CallSceneParams),
    #[serde(rename = "dimChannel")]
    DimChannel(DimChannelParams),
    #[serde(rename = "saveScene")]
    SaveScene(SceneTargetParams),
    #[serde(rename = "undoScene")]
    UndoScene(SceneTargetParams),
    #[serde(rename = "setControlValue")]
    SetControlValue(SetControlValueParams),
    #[serde(rename = "setOutputChannelValue")]
    SetOutputChannelValue(SetOutputChannelValueParams),
    #[serde(rename = "callSceneMin")]
    CallSceneMin(SceneTargetParams),
    #[serde(rename = "setLocalPriority")]
    SetLocalPriority(SceneTargetParams),
    #[serde(rename = "remove")]
    Remove(RemoveParams),
    #[serde(rename = "getProperty")]
    GetProperty(GetPropertyParams),
    #[serde(rename = "setProperty")]
    SetProperty(SetPropertyParams),
    #[serde(rename = "pushNotification")]
    PushNotification(PushNotificationParams),
    #[serde(rename = "x-p44-scriptExec")]
    ScriptExec(ScriptExecParams),
    #[serde(rename = "x-p44-queryScenes")]
    QueryScenes(QueryScenesParams),
    #[serde(rename = "x-p44-queryGroups")]
    QueryGroups(QueryGroupsParams),
    #[serde(rename = "x-p44-checkTriggerCondition")]
    CheckTriggerCondition(TriggerParams),
    #[serde(rename = "x-p44-testTriggerAction")]
    TestTriggerAction(TriggerParams),
    #[serde(rename = "x-p44-setIdentity")]
    SetIdentity(SetIdentityParams),
}

impl MethodCall {
    /// Method name as it appears on the wire.
    pub fn method_name(&self) -> &'static str {
        match self {
            Self::Hello(_) => "hello",
            Self::Bye => "bye",
            Self::AnnounceVdc(_) => "announcevdc",
            Self::AnnounceDevice(_) => "announcedevice",
            Self::CallScene(_) => "callScene",
            Self::DimChannel(_) => "dimChannel",
            Self::SaveScene(_) => "saveScene",
            Self::UndoScene(_) => "undoScene",
            Self::SetControlValue(_) => "setControlValue",
            Self::SetOutputChannelValue(_) => "setOutputChannelValue",
            Self::CallSceneMin(_) => "callSceneMin",
            Self::SetLocalPriority(_) => "setLocalPriority",
            Self::Remove(_) => "remove",
            Self::GetProperty(_) => "getProperty",
            Self::SetProperty(_) => "setProperty",
            Self::PushNotification(_) => "pushNotification",
            Self::ScriptExec(_) => "x-p44-scriptExec",
            Self::QueryScenes(_) => "x-p44-queryScenes",
            Self::QueryGroups(_) => "x-p44-queryGroups",
            Self::CheckTriggerCondition(_) => "x-p44-checkTriggerCondition",
            Self::TestTriggerAction(_) => "x-p44-testTriggerAction",
            Self::SetIdentity(_) => "x-p44-setIdentity",
        }
    }
}

/// Outgoing or incoming call envelope. `id` present means a response is
/// expected; absent means notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(flatten)]
    pub call: MethodCall,
}

/// Response envelope paired to a request by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl ResponseFrame {
    pub fn ok(id: u64, result: Value) -> Self {
        Self { id, result: Some(result), error: None }
    }

    pub fn err(id: u64, error: ErrorBody) -> Self {
        Self { id, result: None, error: Some(error) }
    }
}

/// Any frame read off the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Frame {
    Request(RequestFrame),
    Response(ResponseFrame),
}

#[cfg(test)]
#[path = "frames_tests.rs"]
mod tests;
