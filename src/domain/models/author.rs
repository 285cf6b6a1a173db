use serde_derive::Deserialize;
use serde_derive::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    User,
    Assistant,
}

impl Author {
    pub fn emoji(&self) -> &'static str {
        match self {
            Author::User => return "💬",
            Author::Assistant => return "🤖",
        }
    }
}

impl ToString for Author {
    fn to_string(&self) -> String {
        match self {
            Author::User => return String::from("user"),
            Author::Assistant => return String::from("assistant"),
        }
    }
}
