//! Prompt library.
//!
//! Teachers and pupils work in French, so every instruction sent to the model
//! is French. System contexts are stage-specific; the formatter prompt is the
//! same narrow "convert to JSON" instruction regardless of stage.

use quizbuilder_shared::{Question, QuestionKind, Shape};

use crate::pipeline::AuthoringContext;

const JSON_FIELDS: &str = r#"{
  "question": "énoncé de la question",
  "options": { "A": "...", "B": "...", "C": "...", "D": "..." },
  "correctAnswer": "A" | "B" | "C" | "D",
  "explanation": "pourquoi la bonne réponse est correcte",
  "type": "short" | "long" | "image"
}"#;

fn kind_hint(kind: QuestionKind) -> &'static str {
    match kind {
        QuestionKind::Short => "une question courte, lisible en une phrase",
        QuestionKind::Long => "une question longue avec une mise en situation",
        QuestionKind::Image => {
            "une question qui s'appuie sur une image décrite précisément dans l'énoncé"
        }
    }
}

/// System context for the master-question stage.
pub fn master_system_context(ctx: &AuthoringContext) -> String {
    format!(
        "Tu es un assistant pédagogique qui aide un enseignant d'école primaire \
         (niveau {level}) à créer des quiz.\n\
         Produis exactement UN QCM : {hint}, avec quatre options étiquetées A, B, C et D, \
         une seule bonne réponse et une courte explication adaptée à des enfants.\n\
         Réponds avec un objet JSON de la forme :\n{fields}\n\
         Le champ \"type\" vaut \"{kind}\".",
        level = ctx.class_level,
        hint = kind_hint(ctx.question_kind),
        fields = JSON_FIELDS,
        kind = ctx.question_kind,
    )
}

/// System context for the variations stage.
pub fn variations_system_context(ctx: &AuthoringContext) -> String {
    format!(
        "Tu es un assistant pédagogique qui aide un enseignant d'école primaire \
         (niveau {level}) à créer des quiz.\n\
         À partir de la question maîtresse fournie, produis exactement {count} variations \
         de difficulté égale : même notion, mêmes compétences, énoncés et valeurs différents.\n\
         Chaque variation a quatre options étiquetées A, B, C et D, une seule bonne réponse \
         et une explication.\n\
         Réponds avec un tableau JSON de {count} objets de la forme :\n{fields}",
        level = ctx.class_level,
        count = ctx.variation_count,
        fields = JSON_FIELDS,
    )
}

/// User message for the variations stage, embedding the accepted master.
pub fn variations_user_message(master: &Question, count: u32, extra: Option<&str>) -> String {
    let master_json =
        serde_json::to_string_pretty(master).unwrap_or_else(|_| master.prompt.clone());
    let mut message = format!(
        "Voici la question maîtresse validée :\n{master_json}\n\n\
         Génère {count} variations de cette question."
    );
    if let Some(extra) = extra.map(str::trim).filter(|e| !e.is_empty()) {
        message.push_str("\nConsignes supplémentaires : ");
        message.push_str(extra);
    }
    message
}

/// System prompt for the low-temperature formatting call.
pub fn formatter_system_prompt(shape: Shape) -> String {
    let target = match shape {
        Shape::Single => "un unique objet JSON",
        Shape::Array => "un tableau JSON d'objets",
    };
    format!(
        "Tu convertis du texte en JSON. Tu ne fais rien d'autre.\n\
         Extrais la ou les questions du texte fourni et renvoie {target}, \
         chaque objet ayant exactement la forme :\n{JSON_FIELDS}\n\
         Ne renvoie que le JSON, sans commentaire ni texte autour."
    )
}

/// User message for the formatting call.
pub fn formatter_user_message(raw: &str, shape: Shape) -> String {
    let expected = match shape {
        Shape::Single => "Forme attendue : un seul objet.",
        Shape::Array => "Forme attendue : un tableau.",
    };
    format!("{expected}\n\nTexte à convertir :\n{raw}")
}
