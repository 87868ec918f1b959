//! Analysis request/response models
//!
//! Serde models for the external analysis webhook, plus normalization of
//! its loosely-shaped payload: the result may arrive as a single object,
//! as an array whose first element is the payload, or wrapped under an
//! `output` key. Downstream code only ever sees the unwrapped object.

use crate::utils::error::SubmissionError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What the visitor asked to analyze
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Organization behind the press release
    pub organizacion: String,
    /// Topic of the press release
    pub tema: String,
    /// Publication date, ISO date string
    pub fecha: String,
}

/// One media mention inside the analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mencion {
    /// Outlet name
    pub medio: String,
    /// Kind of coverage (press, radio, TV, ...)
    pub tipo: String,
    /// Date of the mention
    pub fecha: String,
    /// Short excerpt, when the backend provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracto: Option<String>,
    /// Full text, when the backend provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texto: Option<String>,
}

/// Mention collection with optional total
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Menciones {
    /// Total mention count as reported by the backend
    #[serde(default)]
    pub total: Option<u32>,
    /// Individual mentions
    #[serde(default)]
    pub detalle: Vec<Mencion>,
}

/// The analysis payload returned by the webhook.
///
/// Field set mirrors what the backend actually sends; everything beyond
/// the headline verdict is optional or defaulted because the backend omits
/// sections freely (e.g. when there was no coverage at all).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Set when the backend found no coverage at all
    #[serde(default)]
    pub sin_cobertura: bool,
    /// Free-form message accompanying `sin_cobertura`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mensaje: Option<String>,
    /// Headline verdict ("Sí, funcionó", "No funcionó", ...)
    #[serde(default)]
    pub resultado_global: String,
    /// Executive summary paragraph
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resumen_ejecutivo: Option<String>,
    /// Impact assessment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impacto: Option<String>,
    /// Press coverage count
    #[serde(default)]
    pub cobertura_medios: f64,
    /// Radio coverage count
    #[serde(default)]
    pub cobertura_radio: f64,
    /// TV coverage count
    #[serde(default)]
    pub cobertura_tv: f64,
    /// Broadcast coverage count
    #[serde(default)]
    pub cobertura_emisiones: f64,
    /// How many days the coverage lasted
    #[serde(default)]
    pub duracion_dias: f64,
    /// Estimated reach; the backend sends either a number or a string
    #[serde(default)]
    pub alcance_estimado: Value,
    /// Date range of the coverage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rango_fechas: Option<String>,
    /// Media mentions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menciones: Option<Menciones>,
    /// Actionable recommendations
    #[serde(default)]
    pub recomendaciones: Vec<String>,
}

impl AnalysisResult {
    /// Whether the headline verdict reads as positive.
    ///
    /// Mirrors the product's display rule: the verdict mentions
    /// "funcionó" and does not start with "no".
    pub fn is_positive(&self) -> bool {
        let verdict = self.resultado_global.to_lowercase();
        verdict.contains("funcionó") && !verdict.starts_with("no")
    }

    /// Estimated reach as display text
    pub fn alcance_display(&self) -> String {
        match &self.alcance_estimado {
            Value::String(s) => s.clone(),
            Value::Null => "-".to_string(),
            other => other.to_string(),
        }
    }

    /// Render the downloadable plain-text report for this analysis
    pub fn render_report(&self, request: &AnalysisRequest) -> String {
        let mut report = String::new();
        report.push_str("ANÁLISIS COMPLETO - NOTA DE PRENSA\n");
        report.push_str(&"=".repeat(60));
        report.push_str("\n\n");
        report.push_str(&format!("Organización: {}\n", request.organizacion));
        report.push_str(&format!("Tema: {}\n", request.tema));
        report.push_str(&format!("Fecha de publicación: {}\n", request.fecha));
        report.push_str(&format!("Resultado global: {}\n", self.resultado_global));

        if let Some(resumen) = &self.resumen_ejecutivo {
            report.push_str(&format!("\nResumen ejecutivo:\n{}\n", resumen));
        }

        report.push_str(&format!(
            "\nCobertura en medios: {}\nCobertura en radio: {}\nCobertura en TV: {}\nEmisiones: {}\n",
            self.cobertura_medios, self.cobertura_radio, self.cobertura_tv, self.cobertura_emisiones
        ));
        report.push_str(&format!("Duración de la cobertura: {} días\n", self.duracion_dias));
        report.push_str(&format!("Alcance estimado: {}\n", self.alcance_display()));

        if let Some(menciones) = &self.menciones {
            if !menciones.detalle.is_empty() {
                report.push_str("\nMenciones:\n");
                for mencion in &menciones.detalle {
                    report.push_str(&format!(
                        "  - {} ({}, {})\n",
                        mencion.medio, mencion.tipo, mencion.fecha
                    ));
                }
            }
        }

        if !self.recomendaciones.is_empty() {
            report.push_str("\nRecomendaciones:\n");
            for recomendacion in &self.recomendaciones {
                report.push_str(&format!("  - {}\n", recomendacion));
            }
        }

        report
    }
}

/// Normalize a raw webhook body into an [`AnalysisResult`].
///
/// Accepts the three shapes the backend emits (object, single-element
/// array, `{output: ...}` wrapper) and rejects empty or malformed bodies.
pub fn normalize_payload(body: &str) -> Result<AnalysisResult, SubmissionError> {
    if body.trim().is_empty() {
        return Err(SubmissionError::EmptyResponse);
    }

    let mut value: Value = serde_json::from_str(body)
        .map_err(|e| SubmissionError::MalformedResponse(e.to_string()))?;

    if let Value::Array(items) = value {
        value = items
            .into_iter()
            .next()
            .ok_or(SubmissionError::EmptyResponse)?;
    }

    let output = match &mut value {
        Value::Object(map) => map.remove("output"),
        _ => None,
    };
    if let Some(output) = output {
        value = output;
    }

    serde_json::from_value(value).map_err(|e| SubmissionError::MalformedResponse(e.to_string()))
}
