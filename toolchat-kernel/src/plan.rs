//! Structured actions: the loose planner form and the validated form.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::DispatchError;

/// Closed set of plan identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum ToolKind {
    /// QR code for a URL.
    QrUrl,
    /// QR code for free text.
    QrText,
    /// QR code with Wi-Fi credentials.
    QrWifi,
    /// QR code with a vCard contact.
    QrVcard,
    /// Decode a QR image.
    QrDecode,
    /// Call a tool on an operator-configured backend.
    ExternalCall,
    /// Temperature conversion on the remote units service.
    UnitConversion,
    /// Plain conversation with the LLM.
    Chat,
}

impl ToolKind {
    /// Every identifier, in the order the planner instruction lists them.
    pub const ALL: [Self; 8] = [
        Self::QrUrl,
        Self::QrText,
        Self::QrWifi,
        Self::QrVcard,
        Self::QrDecode,
        Self::ExternalCall,
        Self::UnitConversion,
        Self::Chat,
    ];

    /// Wire name of the identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QrUrl => "qr_url",
            Self::QrText => "qr_text",
            Self::QrWifi => "qr_wifi",
            Self::QrVcard => "qr_vcard",
            Self::QrDecode => "qr_decode",
            Self::ExternalCall => "external_call",
            Self::UnitConversion => "unit_conversion",
            Self::Chat => "chat",
        }
    }

    /// Exact lookup of a wire name.
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Lookup that maps anything unknown to [`ToolKind::Chat`].
    #[must_use]
    pub fn parse(name: &str) -> Self {
        Self::from_wire(name).unwrap_or(Self::Chat)
    }
}

impl From<String> for ToolKind {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{tool, args}` decision, either produced by the planner or typed by the
/// user with `run`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    /// Which action to take.
    pub tool: ToolKind,
    /// Named arguments; anything that is not an object decodes as empty.
    #[serde(default, deserialize_with = "object_or_empty")]
    pub args: Map<String, Value>,
}

impl ActionPlan {
    /// Creates a plan.
    #[must_use]
    pub fn new(tool: ToolKind, args: Map<String, Value>) -> Self {
        Self { tool, args }
    }

    /// Plan that forwards `prompt` to the LLM.
    #[must_use]
    pub fn chat(prompt: impl Into<String>) -> Self {
        let mut args = Map::new();
        args.insert("prompt".into(), Value::String(prompt.into()));
        Self::new(ToolKind::Chat, args)
    }

    /// Builder-style argument insertion.
    #[must_use]
    pub fn with_arg(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.args.insert(name.to_owned(), value.into());
        self
    }
}

impl fmt::Display for ActionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tool, Value::Object(self.args.clone()))
    }
}

fn object_or_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map,
        _ => Map::new(),
    })
}

/// Target scale of a temperature conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemperatureUnit {
    /// Degrees Celsius.
    Celsius,
    /// Degrees Fahrenheit.
    Fahrenheit,
}

impl TemperatureUnit {
    /// Single-letter code understood by the units service.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Celsius => "C",
            Self::Fahrenheit => "F",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "c" | "celsius" | "°c" => Some(Self::Celsius),
            "f" | "fahrenheit" | "°f" => Some(Self::Fahrenheit),
            _ => None,
        }
    }
}

/// QR error-correction level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCorrection {
    /// About 7% recoverable.
    Low,
    /// About 15% recoverable; the provider default.
    Medium,
    /// About 25% recoverable.
    Quartile,
    /// About 30% recoverable.
    High,
}

impl ErrorCorrection {
    /// Single-letter code understood by the QR provider.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Low => "L",
            Self::Medium => "M",
            Self::Quartile => "Q",
            Self::High => "H",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "L" | "LOW" => Some(Self::Low),
            "M" | "MEDIUM" => Some(Self::Medium),
            "Q" | "QUARTILE" => Some(Self::Quartile),
            "H" | "HIGH" => Some(Self::High),
            _ => None,
        }
    }
}

/// Optional rendering settings for a QR image; unset fields use the
/// provider defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QrStyle {
    /// Error-correction level.
    pub error_correction: Option<ErrorCorrection>,
    /// Pixels per module.
    pub box_size: Option<u32>,
    /// Quiet-zone width in modules.
    pub border: Option<u32>,
    /// Foreground colour.
    pub fill_color: Option<String>,
    /// Background colour.
    pub back_color: Option<String>,
    /// Output file name inside the provider's output directory.
    pub filename: Option<String>,
}

impl QrStyle {
    /// Provider arguments for the fields that are set.
    #[must_use]
    pub fn to_arguments(&self) -> Map<String, Value> {
        let mut args = Map::new();
        if let Some(level) = self.error_correction {
            args.insert("error_correction".into(), level.code().into());
        }
        if let Some(size) = self.box_size {
            args.insert("box_size".into(), size.into());
        }
        if let Some(border) = self.border {
            args.insert("border".into(), border.into());
        }
        for (name, value) in [
            ("fill_color", &self.fill_color),
            ("back_color", &self.back_color),
            ("filename", &self.filename),
        ] {
            if let Some(value) = value {
                args.insert(name.into(), value.as_str().into());
            }
        }
        args
    }
}

/// Validated action with typed payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    /// Encode a URL; error correction defaults to quartile.
    QrUrl {
        /// URL to encode.
        url: String,
        /// Rendering settings.
        style: QrStyle,
    },
    /// Encode free text.
    QrText {
        /// Text to encode.
        text: String,
        /// Rendering settings.
        style: QrStyle,
    },
    /// Encode Wi-Fi credentials.
    QrWifi {
        /// Network name.
        ssid: String,
        /// Password; empty for open networks.
        password: String,
        /// Authentication scheme (`WPA`, `WEP`, `nopass`).
        auth: String,
        /// Whether the network hides its SSID.
        hidden: bool,
        /// Output file name.
        filename: Option<String>,
    },
    /// Encode a contact card.
    QrVcard {
        /// Full name.
        name: String,
        /// Phone number.
        tel: String,
        /// Optional e-mail address.
        email: Option<String>,
        /// Output file name.
        filename: Option<String>,
    },
    /// Decode an image.
    QrDecode {
        /// Path of the image to read.
        image_path: String,
    },
    /// Call (or list the tools of) an external backend.
    ExternalCall {
        /// Backend label.
        server: String,
        /// Tool to call; `None` lists the backend's tools.
        tool: Option<String>,
        /// Arguments forwarded verbatim.
        arguments: Map<String, Value>,
    },
    /// Convert a temperature.
    UnitConversion {
        /// Magnitude.
        value: f64,
        /// Scale `value` is expressed in.
        unit: TemperatureUnit,
    },
    /// Talk to the LLM.
    Chat {
        /// Text sent as the user turn.
        prompt: String,
    },
}

/// Wi-Fi password placeholder meaning "open network".
pub const NO_PASSWORD: &str = "NOPASS";

/// Authentication scheme of an open Wi-Fi network.
pub const OPEN_NETWORK_AUTH: &str = "nopass";

impl TryFrom<&ActionPlan> for Action {
    type Error = DispatchError;

    fn try_from(plan: &ActionPlan) -> Result<Self, Self::Error> {
        let fields = Fields {
            tool: plan.tool,
            args: &plan.args,
        };
        Ok(match plan.tool {
            ToolKind::QrUrl => {
                let url = fields.required("url")?;
                let mut style = fields.style()?;
                style.error_correction.get_or_insert(ErrorCorrection::Quartile);
                Self::QrUrl { url, style }
            }
            ToolKind::QrText => Self::QrText {
                text: fields.required("text")?,
                style: fields.style()?,
            },
            ToolKind::QrWifi => {
                let ssid = fields.required("ssid")?;
                let password = fields
                    .optional("password")
                    .filter(|password| !password.eq_ignore_ascii_case(NO_PASSWORD))
                    .unwrap_or_default();
                let auth = fields.optional("auth").unwrap_or_else(|| {
                    if password.is_empty() {
                        OPEN_NETWORK_AUTH.to_owned()
                    } else {
                        "WPA".to_owned()
                    }
                });
                Self::QrWifi {
                    ssid,
                    password,
                    auth,
                    hidden: fields.flag("hidden")?,
                    filename: fields.optional("filename"),
                }
            }
            ToolKind::QrVcard => Self::QrVcard {
                name: fields.required("name")?,
                tel: fields.required("tel")?,
                email: fields.optional("email"),
                filename: fields.optional("filename"),
            },
            ToolKind::QrDecode => Self::QrDecode {
                image_path: fields.required("image_path")?,
            },
            ToolKind::ExternalCall => Self::ExternalCall {
                server: fields.required("server")?,
                tool: fields.optional("tool"),
                arguments: fields.object("arguments")?,
            },
            ToolKind::UnitConversion => {
                let value = fields.number("value")?;
                let raw_unit = fields.required("unit")?;
                let unit = TemperatureUnit::parse(&raw_unit).ok_or_else(|| {
                    fields.invalid("unit", format!("expected C or F, got `{raw_unit}`"))
                })?;
                Self::UnitConversion { value, unit }
            }
            ToolKind::Chat => Self::Chat {
                prompt: fields.optional("prompt").unwrap_or_default(),
            },
        })
    }
}

struct Fields<'a> {
    tool: ToolKind,
    args: &'a Map<String, Value>,
}

impl Fields<'_> {
    fn optional(&self, field: &str) -> Option<String> {
        match self.args.get(field)? {
            Value::String(text) => Some(text.trim().to_owned()).filter(|text| !text.is_empty()),
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            _ => None,
        }
    }

    fn required(&self, field: &'static str) -> Result<String, DispatchError> {
        self.optional(field).ok_or(DispatchError::MissingArgument {
            tool: self.tool,
            field,
        })
    }

    fn number(&self, field: &'static str) -> Result<f64, DispatchError> {
        let value = match self.args.get(field) {
            Some(Value::Number(number)) => number.as_f64(),
            Some(Value::String(text)) if !text.trim().is_empty() => text.trim().parse().ok(),
            _ => {
                return Err(DispatchError::MissingArgument {
                    tool: self.tool,
                    field,
                });
            }
        };
        value
            .filter(|value: &f64| value.is_finite())
            .ok_or_else(|| self.invalid(field, "expected a number"))
    }

    fn count(&self, field: &'static str) -> Result<Option<u32>, DispatchError> {
        let value = match self.args.get(field) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Number(number)) => number.as_u64(),
            Some(Value::String(text)) if text.trim().is_empty() => return Ok(None),
            Some(Value::String(text)) => text.trim().parse().ok(),
            Some(_) => None,
        };
        value
            .and_then(|value| u32::try_from(value).ok())
            .map(Some)
            .ok_or_else(|| self.invalid(field, "expected a non-negative integer"))
    }

    fn flag(&self, field: &'static str) -> Result<bool, DispatchError> {
        match self.args.get(field) {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(flag)) => Ok(*flag),
            Some(Value::String(text)) => match text.trim().to_ascii_lowercase().as_str() {
                "" | "false" | "no" | "0" => Ok(false),
                "true" | "yes" | "1" => Ok(true),
                _ => Err(self.invalid(field, "expected true or false")),
            },
            Some(_) => Err(self.invalid(field, "expected true or false")),
        }
    }

    fn style(&self) -> Result<QrStyle, DispatchError> {
        let error_correction = match self.optional("error_correction") {
            Some(raw) => Some(ErrorCorrection::parse(&raw).ok_or_else(|| {
                self.invalid(
                    "error_correction",
                    format!("expected L, M, Q or H, got `{raw}`"),
                )
            })?),
            None => None,
        };
        Ok(QrStyle {
            error_correction,
            box_size: self.count("box_size")?,
            border: self.count("border")?,
            fill_color: self.optional("fill_color"),
            back_color: self.optional("back_color"),
            filename: self.optional("filename"),
        })
    }

    fn object(&self, field: &'static str) -> Result<Map<String, Value>, DispatchError> {
        match self.args.get(field) {
            None | Some(Value::Null) => Ok(Map::new()),
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(Value::String(text)) if text.trim().is_empty() => Ok(Map::new()),
            Some(Value::String(text)) => match serde_json::from_str(text) {
                Ok(Value::Object(map)) => Ok(map),
                _ => Err(self.invalid(field, "expected a JSON object")),
            },
            Some(_) => Err(self.invalid(field, "expected a JSON object")),
        }
    }

    fn invalid(&self, field: &'static str, reason: impl Into<String>) -> DispatchError {
        DispatchError::InvalidArgument {
            tool: self.tool,
            field,
            reason: reason.into(),
        }
    }
}
