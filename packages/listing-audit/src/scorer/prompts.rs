//! Rubric prompt and sentinel analyses.
//!
//! The section labels below are a contract with [`super::rating`]: the
//! rating is read back from the `Puntuación Individual (0-10):` line, so
//! relabeling it breaks extraction.

/// Evaluation rubric sent with every image.
pub const RUBRIC_PROMPT: &str = r#"
Eres un experto en fotografía de coches para campañas publicitarias de alto nivel. Tu tarea es realizar un análisis exhaustivo y crítico de la siguiente imagen de un coche. Evalúa todos los aspectos visuales y técnicos relevantes para una campaña premium, como iluminación, composición, nitidez, color, reflejos, fondo, ángulo, distracciones, limpieza y potencial publicitario.

La imagen es la Foto {image_number} con URL: {image_url}

Genera un análisis estructurado siguiendo este formato EXACTO:

Imagen {image_number}:
Descripción del Plano y Composición: [Describe el plano (ej. frontal, lateral, detalle), el ángulo y los elementos clave de la composición.]
Evaluación Cualitativa:
Puntos Fuertes: [Enumera los aspectos positivos. Si no hay ninguno, indica "Ninguno significativo."]
Áreas de Mejora:
1. [Describe el primer área de mejora con detalle (ej. "Exceso de Elementos Distractores", "Iluminación y Reflejos", "Fondo Genérico").]
2. [Describe la segunda área de mejora.]
... (Hasta 3-5 puntos clave si aplica)
Sugerencias Específicas:
1. [Proporciona una sugerencia concreta para cada área de mejora mencionada anteriormente.]
2. [Sugerencia 2.]
... (Corresponde a las áreas de mejora)
Puntuación Individual (0-10): [Califica la imagen en una escala del 0 al 10, donde 10 es perfecta para publicidad de alto nivel y 0 es completamente inutilizable.]
Justificación: [Breve justificación de la puntuación.]

Si alguna imagen no se puede procesar o cargar, indica "Error al cargar la imagen para análisis" en la descripción y 0/10 en la puntuación.
"#;

/// Analysis recorded when the image could not be downloaded.
const DOWNLOAD_FAILURE_ANALYSIS: &str = "Imagen {image_number}:
Descripción del Plano y Composición: No se pudo descargar la imagen.
Evaluación Cualitativa:
Puntos Fuertes: Ninguno.
Áreas de Mejora: 1. Imagen no disponible.
Sugerencias Específicas: 1. Verificar la URL de la imagen.
Puntuación Individual (0-10): 0/10
Justificación: La imagen no pudo ser descargada.";

/// Analysis recorded when decoding, the remote call or parsing failed.
const SCORING_FAILURE_ANALYSIS: &str = "Imagen {image_number}:
Descripción del Plano y Composición: Error al cargar o analizar la imagen.
Evaluación Cualitativa:
Puntos Fuertes: Ninguno.
Áreas de Mejora: 1. No se pudo procesar la imagen.
Sugerencias Específicas: 1. Reintentar o verificar la URL/imagen.
Puntuación Individual (0-10): 0/10
Justificación: Error de procesamiento.";

/// Format the rubric for one image.
pub fn format_rubric_prompt(image_number: usize, image_url: &str) -> String {
    RUBRIC_PROMPT
        .replace("{image_number}", &image_number.to_string())
        .replace("{image_url}", image_url)
}

pub fn download_failure_analysis(image_number: usize) -> String {
    DOWNLOAD_FAILURE_ANALYSIS.replace("{image_number}", &image_number.to_string())
}

pub fn scoring_failure_analysis(image_number: usize) -> String {
    SCORING_FAILURE_ANALYSIS.replace("{image_number}", &image_number.to_string())
}
