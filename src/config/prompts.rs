//! Persona profile and prompt rendering
//!
//! The assistant speaks on behalf of one person. Their profile is static:
//! the built-in one below, or a TOML file loaded once at startup.
//!
//! # Example Profile File
//!
//! ```toml
//! [person]
//! name = "Jafar"
//! aliases = ["jaffar"]
//!
//! [person.native_names]
//! ml = "ജാഫർ"
//! ar = "جعفر"
//!
//! [contact]
//! email = "jafar.dev@example.com"
//!
//! [biography]
//! content = """
//! Jafar is a passionate MERN stack developer...
//! """
//!
//! [topics]
//! keywords = ["your creator"]
//! follow_ups = ["his skills"]
//! ```

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;

use super::language::Language;
use crate::conversation::{Message, Role};

/// Static description of the person the assistant represents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaProfile {
    pub person: PersonInfo,

    #[serde(default)]
    pub contact: ContactInfo,

    pub biography: Biography,

    /// Phrases that mark a question as being about the person
    #[serde(default)]
    pub topics: Topics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonInfo {
    /// Name as written in English
    pub name: String,

    /// Other Latin spellings users type
    #[serde(default)]
    pub aliases: Vec<String>,

    /// Native-script names keyed by locale code
    #[serde(default)]
    pub native_names: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub phone: Option<String>,

    #[serde(default)]
    pub website: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Biography {
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Topics {
    /// Phrases that only ever refer to the person ("your creator")
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Pronoun phrases ("his skills") that count only while the
    /// conversation is already about the person
    #[serde(default)]
    pub follow_ups: Vec<String>,
}

impl PersonaProfile {
    /// The profile compiled into the binary
    pub fn builtin() -> Self {
        let native_names = [
            ("ml".to_string(), builtin::NAME_ML.to_string()),
            ("ar".to_string(), builtin::NAME_AR.to_string()),
        ]
        .into_iter()
        .collect();

        Self {
            person: PersonInfo {
                name: builtin::NAME.to_string(),
                aliases: builtin::ALIASES.iter().map(|a| a.to_string()).collect(),
                native_names,
            },
            contact: ContactInfo {
                email: Some(builtin::EMAIL.to_string()),
                phone: None,
                website: Some(builtin::WEBSITE.to_string()),
            },
            biography: Biography {
                content: builtin::BIOGRAPHY.trim().to_string(),
            },
            topics: Topics {
                keywords: builtin::TOPIC_KEYWORDS.iter().map(|k| k.to_string()).collect(),
                follow_ups: builtin::FOLLOW_UPS.iter().map(|k| k.to_string()).collect(),
            },
        }
    }

    /// Load a profile from a TOML file
    pub async fn load_from_file(path: &Path) -> Result<Self, PromptError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| PromptError::IoError(e.to_string()))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, PromptError> {
        let profile: PersonaProfile =
            toml::from_str(content).map_err(|e| PromptError::ParseError(e.to_string()))?;

        if profile.person.name.trim().is_empty() {
            return Err(PromptError::Invalid("person.name must not be empty".into()));
        }
        Ok(profile)
    }

    /// Name to use when answering in `language`
    pub fn display_name(&self, language: Language) -> &str {
        if language.uses_native_script() {
            if let Some(native) = self.person.native_names.get(language.code()) {
                return native;
            }
        }
        &self.person.name
    }

    /// Topical heuristic: does this question, on its own, concern the person?
    ///
    /// Latin names match whole words, native-script names and topic
    /// keywords match anywhere in the text.
    pub fn is_about_person(&self, question: &str) -> bool {
        let lowered = question.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        let name_hit = std::iter::once(&self.person.name)
            .chain(self.person.aliases.iter())
            .map(|n| n.to_lowercase())
            .any(|n| words.iter().any(|w| *w == n));

        name_hit
            || self
                .person
                .native_names
                .values()
                .any(|n| question.contains(n.as_str()))
            || self
                .topics
                .keywords
                .iter()
                .any(|k| lowered.contains(&k.to_lowercase()))
    }

    /// Like [`is_about_person`](Self::is_about_person), but a follow-up
    /// phrase also counts when the latest earlier user turn in `history`
    /// was about the person.
    pub fn is_about_person_in(&self, question: &str, history: &[Message]) -> bool {
        if self.is_about_person(question) {
            return true;
        }
        if !self.is_follow_up(question) {
            return false;
        }

        let mut in_context = false;
        for turn in history.iter().filter(|m| m.role == Role::User) {
            in_context = self.is_about_person(&turn.content)
                || (in_context && self.is_follow_up(&turn.content));
        }
        in_context
    }

    fn is_follow_up(&self, question: &str) -> bool {
        let lowered = question.to_lowercase();
        self.topics
            .follow_ups
            .iter()
            .any(|p| lowered.contains(&p.to_lowercase()))
    }

    fn all_names(&self) -> Vec<&str> {
        std::iter::once(self.person.name.as_str())
            .chain(self.person.aliases.iter().map(String::as_str))
            .chain(self.person.native_names.values().map(String::as_str))
            .collect()
    }

    fn contact_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(ref email) = self.contact.email {
            lines.push(format!("- Email: {}", email));
        }
        if let Some(ref phone) = self.contact.phone {
            lines.push(format!("- Phone: {}", phone));
        }
        if let Some(ref website) = self.contact.website {
            lines.push(format!("- Website: {}", website));
        }
        lines
    }
}

/// A rendered prompt ready to submit
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub language: Language,
    pub about_person: bool,
}

impl Prompt {
    /// System instruction, then prior turns, then the question
    pub fn into_messages(self, history: Vec<Message>) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(self.system));
        messages.extend(history);
        messages.push(Message::user(self.user));
        messages
    }
}

/// Renders persona prompts and checks replies against the persona rules
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    profile: PersonaProfile,
    impersonation: Regex,
}

impl PromptBuilder {
    pub fn new(profile: PersonaProfile) -> Result<Self, PromptError> {
        let names = profile
            .all_names()
            .into_iter()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|");

        let impersonation = Regex::new(&format!(
            r"(?i)\bI(?:\s+am|'m|’m)\s+({})\b(['’]s)?",
            names
        ))
        .map_err(|e| PromptError::Invalid(e.to_string()))?;

        Ok(Self {
            profile,
            impersonation,
        })
    }

    pub fn profile(&self) -> &PersonaProfile {
        &self.profile
    }

    /// Render the system instruction for `question` in `language`.
    ///
    /// `history` holds the session's earlier turns, oldest first.
    pub fn build(&self, question: &str, language: Language, history: &[Message]) -> Prompt {
        let about_person = self.profile.is_about_person_in(question, history);
        let name = self.profile.display_name(language);
        let english_name = self.profile.person.name.as_str();

        let mut system = format!(
            "You are a friendly personal AI assistant that knows everything about {0}.\n\
             You are not {0}. Never claim to be {0} or speak as {0} in the first person.\n",
            english_name
        );

        system.push_str(&format!(
            "\n## Language\nRespond only in {} (locale code: {}). Do not use any other language in any part of the answer.\n",
            language.display_name(),
            language.code()
        ));
        if language.uses_native_script() && name != english_name {
            system.push_str(&format!(
                "Always write the name {} as \"{}\" in {} script. Do not transliterate it.\n",
                english_name,
                name,
                language.display_name()
            ));
        }

        if about_person {
            system.push_str(&format!(
                "\n## About {0}\nThe user is asking about {0}, directly or indirectly. Answer warmly and with pride, using this profile:\n\n{1}\n",
                english_name, self.profile.biography.content
            ));
            let contact = self.profile.contact_lines();
            if !contact.is_empty() {
                system.push_str(&format!(
                    "\nContact details (mention these prominently):\n{}\n",
                    contact.join("\n")
                ));
            }
        } else {
            system.push_str(
                "\n## General questions\nThe question is not about this person. Answer it concisely and directly.\n",
            );
        }

        system.push_str(&format!(
            "\n## Tone\n{}\nYou may end your reply with a short invitation to learn more about {}.",
            builtin::TONE,
            name
        ));

        Prompt {
            system,
            user: question.to_string(),
            language,
            about_person,
        }
    }

    /// Enforce the persona rules on a generated reply.
    ///
    /// First-person identity claims are rewritten, and for questions about
    /// the person the contact email is appended when the model left it out.
    pub fn guard_reply(&self, reply: &str, prompt: &Prompt) -> String {
        let mut guarded = self
            .impersonation
            .replace_all(reply, |caps: &Captures| {
                if caps.get(2).is_some() {
                    caps[0].to_string()
                } else {
                    format!("I'm the personal assistant of {}", &caps[1])
                }
            })
            .into_owned();

        if prompt.about_person {
            if let Some(ref email) = self.profile.contact.email {
                if !guarded.contains(email.as_str()) {
                    guarded.push_str(&format!(
                        "\n\nYou can reach {} at {}.",
                        self.profile.display_name(prompt.language),
                        email
                    ));
                }
            }
        }

        guarded
    }
}

/// Errors from profile loading
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid profile: {0}")]
    Invalid(String),
}

/// Built-in profile data
pub mod builtin {
    pub const NAME: &str = "Jafar";
    pub const NAME_ML: &str = "ജാഫർ";
    pub const NAME_AR: &str = "جعفر";
    pub const ALIASES: &[&str] = &["jaffar", "jafer"];

    pub const EMAIL: &str = "jafar.dev@example.com";
    pub const WEBSITE: &str = "https://jafar.example.com";

    pub const TONE: &str =
        "Be warm, concise and natural, like a friendly person rather than a robot. Keep the tone confident.";

    pub const TOPIC_KEYWORDS: &[&str] = &[
        "your creator",
        "created you",
        "made you",
        "built you",
        "your developer",
        "your owner",
        "who owns you",
    ];

    pub const FOLLOW_UPS: &[&str] = &[
        "about him",
        "his skills",
        "his experience",
        "his projects",
        "his work",
        "contact him",
        "hire him",
    ];

    pub const BIOGRAPHY: &str = r#"
Jafar is a passionate MERN stack developer and React team lead with over 3 years of experience. He specializes in building scalable web applications using MongoDB, Express, React, and Node.js. He is also skilled in Flutter, MySQL, and MongoDB.

Jafar has led multiple projects in frontend and backend development, focusing on clean code, performance, and user experience. He is deeply interested in AI and is currently exploring chatbot development and AI integrations.

His key achievements include:
- Leading a team to deliver a trading bot platform using Alpaca API with real-time stock data.
- Developing AI-powered resume and job application assistants.
- Building voice and face recognition apps with React Native and face-api.js.

Jafar values continuous learning, teamwork, and writing clean, maintainable code.
"#;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> PromptBuilder {
        PromptBuilder::new(PersonaProfile::builtin()).unwrap()
    }

    #[test]
    fn test_prompt_embeds_locale_code() {
        let builder = builder();
        for language in [Language::English, Language::Malayalam, Language::Arabic] {
            let prompt = builder.build("what is rust?", language, &[]);
            assert!(
                prompt
                    .system
                    .contains(&format!("(locale code: {})", language.code())),
                "missing locale for {:?}",
                language
            );
            for other in [Language::English, Language::Malayalam, Language::Arabic] {
                if other != language {
                    assert!(!prompt
                        .system
                        .contains(&format!("(locale code: {})", other.code())));
                }
            }
        }
    }

    #[test]
    fn test_biography_only_for_person_questions() {
        let builder = builder();
        let bio = &builder.profile().biography.content;

        for question in [
            "who is jafar",
            "Tell me about Jafar's projects",
            "who created you?",
            "ജാഫർ ആരാണ്?",
            "من هو جعفر",
        ] {
            let prompt = builder.build(question, Language::English, &[]);
            assert!(prompt.about_person, "should match: {}", question);
            assert!(prompt.system.contains(bio.as_str()));
            assert!(prompt.system.contains(builtin::EMAIL));
        }

        for question in ["what is the capital of France?", "explain closures", "jafarabad weather"] {
            let prompt = builder.build(question, Language::English, &[]);
            assert!(!prompt.about_person, "should not match: {}", question);
            assert!(!prompt.system.contains(bio.as_str()));
            assert!(prompt.system.contains("concisely and directly"));
        }
    }

    #[test]
    fn test_pronoun_questions_need_context() {
        let builder = builder();
        let bio = &builder.profile().biography.content;

        for question in [
            "Einstein was a physicist. What was his work on relativity?",
            "What are his skills?",
            "tell me about him",
        ] {
            let prompt = builder.build(question, Language::English, &[]);
            assert!(!prompt.about_person, "should not match: {}", question);
            assert!(!prompt.system.contains(bio.as_str()));
        }

        let history = [
            Message::user("who is jafar?"),
            Message::assistant("Jafar is a developer."),
            Message::user("what are his skills?"),
            Message::assistant("React and Node."),
        ];
        let prompt = builder.build("and his projects?", Language::English, &history);
        assert!(prompt.about_person);
        assert!(prompt.system.contains(bio.as_str()));

        let history = [
            Message::user("who was Einstein?"),
            Message::assistant("A physicist."),
        ];
        let prompt = builder.build("what was his work?", Language::English, &history);
        assert!(!prompt.about_person);
    }

    #[test]
    fn test_guard_leaves_unrelated_answers_alone() {
        let builder = builder();
        let prompt = builder.build(
            "Einstein was a physicist. What was his work on relativity?",
            Language::English,
            &[],
        );
        assert_eq!(
            builder.guard_reply("Einstein developed relativity.", &prompt),
            "Einstein developed relativity."
        );
    }

    #[test]
    fn test_native_script_name() {
        let builder = builder();

        let prompt = builder.build("who is jafar", Language::Arabic, &[]);
        assert!(prompt.system.contains(builtin::NAME_AR));
        assert!(!prompt.system.contains(builtin::NAME_ML));

        let prompt = builder.build("who is jafar", Language::Malayalam, &[]);
        assert!(prompt.system.contains(builtin::NAME_ML));

        let prompt = builder.build("who is jafar", Language::English, &[]);
        assert!(!prompt.system.contains(builtin::NAME_AR));
        assert!(!prompt.system.contains(builtin::NAME_ML));
    }

    #[test]
    fn test_prompt_forbids_impersonation() {
        let prompt = builder().build("hello", Language::English, &[]);
        assert!(prompt.system.contains("Never claim to be Jafar"));
        assert!(prompt.system.contains(builtin::TONE));
        assert_eq!(prompt.user, "hello");
    }

    #[test]
    fn test_guard_rewrites_identity_claims() {
        let builder = builder();
        let prompt = builder.build("who is jafar", Language::English, &[]);

        let reply = builder.guard_reply("Hi! I am Jafar, a MERN developer. i'm jafar indeed.", &prompt);
        assert!(!reply.to_lowercase().contains("i am jafar"));
        assert!(!reply.to_lowercase().contains("i'm jafar"));
        assert!(reply.contains("I'm the personal assistant of Jafar"));
    }

    #[test]
    fn test_guard_keeps_possessive() {
        let builder = builder();
        let prompt = builder.build("hello", Language::English, &[]);

        let reply = builder.guard_reply("I'm Jafar's assistant.", &prompt);
        assert_eq!(reply, "I'm Jafar's assistant.");
    }

    #[test]
    fn test_guard_appends_contact_once() {
        let builder = builder();
        let prompt = builder.build("who is jafar", Language::English, &[]);

        let reply = builder.guard_reply("Jafar is a developer.", &prompt);
        assert!(reply.contains(builtin::EMAIL));

        let already = format!("Write to {}.", builtin::EMAIL);
        assert_eq!(builder.guard_reply(&already, &prompt), already);

        let general = builder.build("what is 2+2?", Language::English, &[]);
        assert_eq!(builder.guard_reply("4", &general), "4");
    }

    #[test]
    fn test_into_messages_order() {
        let prompt = builder().build("next", Language::English, &[]);
        let messages = prompt.into_messages(vec![Message::user("prev"), Message::assistant("ok")]);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, crate::conversation::Role::System);
        assert_eq!(messages[1].content, "prev");
        assert_eq!(messages[3], Message::user("next"));
    }

    #[test]
    fn test_parse_profile() {
        let toml_content = r#"
[person]
name = "Amal"
aliases = ["amaal"]

[person.native_names]
ar = "أمل"

[contact]
email = "amal@example.org"

[biography]
content = "Amal builds compilers."

[topics]
keywords = ["your author"]
follow_ups = ["her books"]
"#;

        let profile = PersonaProfile::from_toml(toml_content).unwrap();
        assert_eq!(profile.person.name, "Amal");
        assert_eq!(profile.display_name(Language::Arabic), "أمل");
        assert_eq!(profile.display_name(Language::Malayalam), "Amal");
        assert!(profile.is_about_person("who is your author?"));
        assert!(profile.is_about_person("tell me about amaal"));
        assert!(!profile.is_about_person("list her books"));
        assert!(profile.is_about_person_in("list her books", &[Message::user("who is Amal?")]));
    }

    #[test]
    fn test_profile_requires_name() {
        let toml_content = r#"
[person]
name = "  "

[biography]
content = "x"
"#;
        assert!(matches!(
            PersonaProfile::from_toml(toml_content),
            Err(PromptError::Invalid(_))
        ));
    }
}
