//! Listing aggregation and report rendering.
//!
//! [`aggregate`] is pure: it orders the per-image analyses, averages their
//! ratings and renders the report text. Narrative sections pick a canned
//! grade from a threshold ladder over the average; each section has its own
//! ladder.

use serde::Serialize;
use std::fmt;

use crate::types::{AnalysisOutcome, ImageAnalysis};

/// Descending thresholds; the first one the average reaches wins, otherwise
/// the fallback grade applies.
struct Ladder {
    steps: &'static [(f64, &'static str)],
    fallback: &'static str,
}

impl Ladder {
    fn grade(&self, average: f64) -> &'static str {
        self.steps
            .iter()
            .find(|(threshold, _)| average >= *threshold)
            .map(|(_, grade)| *grade)
            .unwrap_or(self.fallback)
    }
}

const COVERAGE: Ladder = Ladder {
    steps: &[(8.0, "Sobresaliente"), (6.0, "Buena"), (4.0, "Aceptable")],
    fallback: "Deficiente",
};

const COHERENCE: Ladder = Ladder {
    steps: &[(7.0, "Buena"), (4.0, "Regular")],
    fallback: "Muy Deficiente",
};

const ANGLES: Ladder = Ladder {
    steps: &[(6.0, "Buena")],
    fallback: "Regular",
};

const TECHNICAL: Ladder = Ladder {
    steps: &[(5.0, "Aceptable")],
    fallback: "Muy Deficiente",
};

/// Final campaign verdict for a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Average of at least 7.5.
    Adequate,
    /// Average of at least 5.0.
    NeedsImprovement,
    Inadequate,
}

impl Verdict {
    pub fn from_average(average: f64) -> Self {
        if average >= 7.5 {
            Verdict::Adequate
        } else if average >= 5.0 {
            Verdict::NeedsImprovement
        } else {
            Verdict::Inadequate
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Adequate => "Adecuado con oportunidades de optimización.",
            Verdict::NeedsImprovement => "Requiere mejoras significativas.",
            Verdict::Inadequate => "Totalmente Inadecuado.",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rendered report plus the figures it was built from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingReport {
    pub text: String,
    /// Mean rating; `None` when the listing had no images.
    pub average: Option<f64>,
    /// `round(average * 10)` on a 0-100 scale.
    pub global_score: Option<u32>,
    pub verdict: Option<Verdict>,
    pub image_count: usize,
}

impl ListingReport {
    pub fn is_empty(&self) -> bool {
        self.image_count == 0
    }
}

/// Global score on a 0-100 scale.
pub fn global_score(average: f64) -> u32 {
    (average * 10.0).round().clamp(0.0, 100.0) as u32
}

/// Build the report for one listing.
///
/// Analyses may arrive in any order; they are rendered by position. Ratings
/// of failed images (always 0) count towards the average.
pub fn aggregate(listing_name: &str, mut analyses: Vec<ImageAnalysis>) -> ListingReport {
    analyses.sort_by_key(|analysis| analysis.position);

    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("\n--- Análisis de Fotos para: {} ---", listing_name));

    if analyses.is_empty() {
        lines.push(
            "   No se encontraron imágenes en este archivo o todas eran duplicadas.".to_string(),
        );
    } else {
        for analysis in analyses
            .iter()
            .filter(|analysis| analysis.outcome == AnalysisOutcome::DownloadFailed)
        {
            lines.push(format!(
                "   Error: No se pudo descargar la imagen {} (URL: {}). Análisis omitido.",
                analysis.number(),
                analysis.url
            ));
        }

        for analysis in &analyses {
            lines.push(analysis.text.clone());
            lines.push("\n".to_string());
        }
    }

    lines.push("\n--- Parte 2: Análisis Global del Conjunto de Fotografías ---".to_string());

    if analyses.is_empty() {
        lines.push("No se pudieron obtener calificaciones válidas para este archivo.".to_string());
        return ListingReport {
            text: lines.join("\n"),
            average: None,
            global_score: None,
            verdict: None,
            image_count: 0,
        };
    }

    let average =
        analyses.iter().map(|analysis| analysis.rating).sum::<f64>() / analyses.len() as f64;
    let score = global_score(average);
    let verdict = Verdict::from_average(average);

    push_global_analysis(&mut lines, listing_name, average);
    push_verdict(&mut lines, score, verdict);

    ListingReport {
        text: lines.join("\n"),
        average: Some(average),
        global_score: Some(score),
        verdict: Some(verdict),
        image_count: analyses.len(),
    }
}

fn push_global_analysis(lines: &mut Vec<String>, listing_name: &str, average: f64) {
    lines.push(format!(
        "Promedio de Puntuación Individual de todas las fotos de '{}': {:.2}/10",
        listing_name, average
    ));

    push_section(
        lines,
        "Cobertura y Calidad de Planos Fotográficos:",
        "El conjunto ofrece una variedad de planos (exterior, interior, detalles), pero la calidad de ejecución es inconsistente.",
        COVERAGE.grade(average),
        "Basado en las puntuaciones individuales, se observa una falta general de control de iluminación y composición en muchas de las tomas para un estándar publicitario.",
        "Priorizar entornos controlados y técnicas de iluminación profesional. Considerar tomas de acción o lifestyle.",
    );

    push_section(
        lines,
        "Coherencia Visual, Estilo y Narrativa del Conjunto:",
        "El estilo dominante es de 'inventario de concesionario', con un entorno de showroom repetitivo. La narrativa publicitaria es escasa.",
        COHERENCE.grade(average),
        "Aunque hay coherencia en el entorno, esta no es deseable para una campaña premium que busca impactar y emocionar.",
        "Definir una dirección creativa clara que incluya ambientes aspiracionales y elementos que cuenten una historia sobre el vehículo.",
    );

    push_section(
        lines,
        "Variedad de Ángulos y Perspectivas del Vehículo:",
        "Los ángulos cubren lo básico, pero son estáticos. Faltan perspectivas dinámicas y creativas que destaquen el diseño o la experiencia de uso.",
        ANGLES.grade(average),
        "La variedad existe a nivel descriptivo, pero no a nivel creativo o de impacto visual.",
        "Explorar ángulos más dramáticos, tomas en movimiento, y perspectivas que realcen la ergonomía y el lujo interior.",
    );

    push_section(
        lines,
        "Calidad Técnica General Consolidada del Conjunto:",
        "Los problemas recurrentes incluyen reflejos no deseados (incluyendo el fotógrafo o elementos del showroom), iluminación plana, subexposición y elementos distractores (branding del concesionario).",
        TECHNICAL.grade(average),
        "Los fallos técnicos en iluminación y control de reflejos son sistémicos y comprometen seriamente el atractivo publicitario.",
        "Implementar un control riguroso de iluminación, usar polarizadores, y eliminar cualquier distracción en el encuadre. Preparación impecable del vehículo.",
    );
}

fn push_section(
    lines: &mut Vec<String>,
    title: &str,
    analysis: &str,
    grade: &str,
    justification: &str,
    suggestion: &str,
) {
    lines.push(format!("\n{}", title));
    lines.push(format!("Análisis: {}", analysis));
    lines.push(format!("Valoración: {}.", grade));
    lines.push(format!("Justificación: {}", justification));
    lines.push(format!("Sugerencia de Mejora: {}", suggestion));
}

fn push_verdict(lines: &mut Vec<String>, score: u32, verdict: Verdict) {
    lines.push("\n--- Parte 3: Puntuación Global y Veredicto del Conjunto ---".to_string());
    lines.push(format!("Puntuación Global del Conjunto (0-100): {}/100", score));
    lines.push("Justificación de la Puntuación Global:".to_string());
    lines.push("La puntuación global refleja la suma de las deficiencias individuales. A pesar de una buena cobertura descriptiva, la ejecución técnica y artística es deficiente para un estándar de campaña publicitaria de alto nivel.".to_string());

    lines.push("\nResumen Crítico Final del Conjunto:".to_string());
    lines.push("Principales Fortalezas del Conjunto Fotográfico: Amplitud descriptiva de planos y foco en funcionalidades clave del vehículo.".to_string());
    lines.push("Principales Áreas de Mejora Crítica para el Conjunto: Calidad de iluminación y control de reflejos, entorno y narrativa publicitaria, y estilismo/postproducción.".to_string());

    lines.push("\nVeredicto Final para Campaña Publicitaria:".to_string());
    lines.push(verdict.as_str().to_string());
    lines.push("Este conjunto, en su estado actual, no cumple con los requisitos mínimos de calidad técnica, artística y estratégica para una campaña publicitaria de alto nivel en la industria automotriz. Requiere un replanteamiento completo y nuevas sesiones fotográficas, preferiblemente en entornos controlados (estudio) y/o locaciones exteriores cuidadosamente seleccionadas, con un equipo de iluminación profesional y una dirección creativa que infunda emoción y narrativa en las imágenes.".to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::prompts::download_failure_analysis;

    fn scored(position: usize, rating: f64) -> ImageAnalysis {
        ImageAnalysis {
            position,
            url: format!("https://img.example.com/{}.jpg", position),
            text: format!(
                "Imagen {}:\nPuntuación Individual (0-10): {}",
                position + 1,
                rating
            ),
            rating,
            outcome: AnalysisOutcome::Scored,
        }
    }

    fn download_failed(position: usize) -> ImageAnalysis {
        ImageAnalysis {
            position,
            url: format!("https://img.example.com/{}.jpg", position),
            text: download_failure_analysis(position + 1),
            rating: 0.0,
            outcome: AnalysisOutcome::DownloadFailed,
        }
    }

    #[test]
    fn test_empty_listing() {
        let report = aggregate("coches_elia_7.xml", vec![]);

        assert!(report.is_empty());
        assert_eq!(report.average, None);
        assert_eq!(report.global_score, None);
        assert_eq!(report.verdict, None);
        assert!(report
            .text
            .contains("No se encontraron imágenes en este archivo o todas eran duplicadas."));
        assert!(report.text.contains("--- Parte 2:"));
        assert!(report
            .text
            .contains("No se pudieron obtener calificaciones válidas para este archivo."));
        assert!(!report.text.contains("Parte 3"));
    }

    #[test]
    fn test_mixed_ratings_average() {
        let report = aggregate("coches_elia_1.xml", vec![scored(0, 9.0), download_failed(1)]);

        assert_eq!(report.average, Some(4.5));
        assert_eq!(report.global_score, Some(45));
        assert_eq!(report.verdict, Some(Verdict::Inadequate));
        assert!(report.text.contains("': 4.50/10"));
        assert!(report
            .text
            .contains("Puntuación Global del Conjunto (0-100): 45/100"));
        assert!(report.text.contains(
            "   Error: No se pudo descargar la imagen 2 (URL: https://img.example.com/1.jpg). Análisis omitido."
        ));
        assert!(report.text.ends_with("narrativa en las imágenes."));
    }

    #[test]
    fn test_threshold_boundaries_are_inclusive() {
        let report = aggregate("x", vec![scored(0, 7.5)]);

        assert_eq!(report.global_score, Some(75));
        assert_eq!(report.verdict, Some(Verdict::Adequate));
        assert!(report.text.contains("Valoración: Buena."));
        assert!(report.text.contains("\nAdecuado con oportunidades de optimización.\n"));

        assert_eq!(Verdict::from_average(5.0), Verdict::NeedsImprovement);
        assert_eq!(Verdict::from_average(4.99), Verdict::Inadequate);
        assert_eq!(COVERAGE.grade(8.0), "Sobresaliente");
        assert_eq!(COVERAGE.grade(3.99), "Deficiente");
        assert_eq!(COHERENCE.grade(4.0), "Regular");
        assert_eq!(ANGLES.grade(5.9), "Regular");
        assert_eq!(TECHNICAL.grade(5.0), "Aceptable");
    }

    #[test]
    fn test_all_sections_graded() {
        let report = aggregate("x", vec![scored(0, 3.0)]);

        assert!(report.text.contains("Valoración: Deficiente."));
        assert!(report.text.contains("Valoración: Muy Deficiente."));
        assert!(report.text.contains("Valoración: Regular."));
        assert!(report.text.contains("\nTotalmente Inadecuado.\n"));
    }

    #[test]
    fn test_sorted_by_position() {
        let report = aggregate("x", vec![scored(2, 5.0), scored(0, 5.0), scored(1, 5.0)]);

        let first = report.text.find("Imagen 1:").unwrap();
        let second = report.text.find("Imagen 2:").unwrap();
        let third = report.text.find("Imagen 3:").unwrap();
        assert!(first < second && second < third);
        assert_eq!(report.image_count, 3);
    }

    #[test]
    fn test_global_score_rounds() {
        assert_eq!(global_score(6.66), 67);
        assert_eq!(global_score(6.64), 66);
        assert_eq!(global_score(10.0), 100);
        assert_eq!(global_score(0.0), 0);
    }
}
