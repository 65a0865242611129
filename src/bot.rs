//! Chat command handler for browsing posts.
//!
//! This turns a chat message or button payload into a gateway call and renders
//! the outcome as HTML text with inline buttons. Delivering replies is left to
//! whatever chat transport drives the [`Bot`].

use serde::Serialize;

use crate::{
	gateway::Gateway,
	post::Post,
	store::StoreError,
	Error,
};

/// Payload of the button leading back to the post list.
pub const BACK: &str = "back";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
	/// `/post`, `/posts` or the back button.
	List,
	/// `/post <id>` or an `id:<id>` button payload.
	Show(i64),
	Unknown,
}

impl Command {
	pub fn parse(text: &str) -> Self {
		let text = text.trim();

		if text == BACK {
			return Self::List;
		}

		if let Some(id) = text.strip_prefix("id:") {
			return id.trim().parse().map_or(Self::Unknown, Self::Show);
		}

		let mut words = text.split_whitespace();

		match (words.next(), words.next(), words.next()) {
			(Some("/post" | "/posts"), None, _) => Self::List,
			(Some("/post"), Some(id), None) => id.parse().map_or(Self::Unknown, Self::Show),
			_ => Self::Unknown,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
	pub label: String,
	/// The payload sent back when the button is pressed.
	pub data: String,
}

/// HTML text and inline buttons to send back to the chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
	pub text: String,
	pub buttons: Vec<Button>,
}

fn escape_html(text: &str) -> String {
	let mut escaped = String::with_capacity(text.len());

	for c in text.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' => escaped.push_str("&quot;"),
			c => escaped.push(c),
		}
	}

	escaped
}

fn back_button() -> Button {
	Button {
		label: "Back".into(),
		data: BACK.into(),
	}
}

fn render_list(posts: &[Post]) -> Reply {
	Reply {
		text: format!("Latest posts ({} shown)", posts.len()),
		buttons: posts
			.iter()
			.map(|post| Button {
				label: post.title.clone(),
				data: format!("id:{}", post.id),
			})
			.collect(),
	}
}

fn render_post(post: &Post) -> Reply {
	let text = format!(
		"<b>{}</b>\nAuthor: <u>{}</u>\n{}\n<i>Published: <u>{}</u></i>",
		escape_html(&post.title),
		escape_html(&post.author_name),
		escape_html(&post.body),
		post.created_at.format(TIME_FORMAT),
	);

	Reply {
		text,
		buttons: vec![back_button()],
	}
}

/// Answers chat commands as the user owning `token`.
pub struct Bot {
	gateway: Gateway,
	token: String,
}

impl Bot {
	pub fn new(gateway: Gateway, token: impl Into<String>) -> Self {
		Self {
			gateway,
			token: token.into(),
		}
	}

	#[tracing::instrument(skip(self))]
	pub async fn handle(&self, text: &str) -> Result<Reply, Error> {
		let identity = self.gateway.authenticate(&self.token).await?;

		match Command::parse(text) {
			Command::List => {
				let engine = self.gateway.engine();
				let posts = engine.execute(&identity, engine.default_spec()).await?;

				Ok(render_list(&posts))
			}
			Command::Show(id) => match self.gateway.get_post(&identity, id).await {
				Ok(post) => Ok(render_post(&post)),
				Err(Error::Store(StoreError::NotFound)) => Ok(Reply {
					text: "Post not found.".into(),
					buttons: vec![back_button()],
				}),
				Err(e) => Err(e),
			},
			Command::Unknown => Ok(Reply {
				text: "Unknown command. Use /post to list posts or /post &lt;id&gt; to read one."
					.into(),
				buttons: Vec::new(),
			}),
		}
	}
}

#[cfg(test)]
mod test {
	use std::sync::Arc;

	use super::*;
	use crate::{
		gateway::GatewayOptions,
		model::RegisterInput,
		post::CreatePostInput,
		store::MemoryStore,
		token::AuthError,
	};

	#[test]
	fn test_parse_commands() {
		assert_eq!(Command::parse("/post"), Command::List);
		assert_eq!(Command::parse(" /posts "), Command::List);
		assert_eq!(Command::parse("back"), Command::List);
		assert_eq!(Command::parse("/post 12"), Command::Show(12));
		assert_eq!(Command::parse("id:7"), Command::Show(7));

		for text in ["", "hello", "/post abc", "/post 1 2", "/posts 1", "id:x"] {
			assert_eq!(Command::parse(text), Command::Unknown, "{text:?}");
		}
	}

	#[test]
	fn test_escape_html() {
		assert_eq!(
			escape_html(r#"<b>"Tom" & Jerry</b>"#),
			"&lt;b&gt;&quot;Tom&quot; &amp; Jerry&lt;/b&gt;"
		);
	}

	async fn bot() -> Bot {
		let gateway = Gateway::new(Arc::new(MemoryStore::new()), GatewayOptions::default());
		let session = gateway
			.register(RegisterInput {
				email: "john@smith.com".into(),
				password: "hunter2hunter".into(),
				username: "john".into(),
			})
			.await
			.unwrap();
		let identity = gateway.authenticate(&session.token.token).await.unwrap();

		for (title, visible) in [("First <post>", true), ("Hidden", false), ("Second", true)] {
			gateway
				.create_post(
					&identity,
					CreatePostInput {
						title: title.into(),
						body: "Hello & welcome".into(),
						tags: Vec::new(),
						visible,
					},
				)
				.await
				.unwrap();
		}

		Bot::new(gateway, session.token.token)
	}

	#[tokio::test]
	async fn test_list_posts() {
		let bot = bot().await;
		let reply = bot.handle("/post").await.unwrap();

		assert_eq!(reply.text, "Latest posts (2 shown)");
		assert_eq!(
			reply.buttons,
			[
				Button {
					label: "Second".into(),
					data: "id:3".into()
				},
				Button {
					label: "First <post>".into(),
					data: "id:1".into()
				},
			]
		);

		assert_eq!(bot.handle("back").await.unwrap(), reply);
	}

	#[tokio::test]
	async fn test_show_post() {
		let bot = bot().await;
		let reply = bot.handle("id:1").await.unwrap();

		assert!(reply
			.text
			.starts_with("<b>First &lt;post&gt;</b>\nAuthor: <u>john</u>\nHello &amp; welcome\n"));
		assert_eq!(reply.buttons, [back_button()]);

		let reply = bot.handle("/post 2").await.unwrap();
		assert_eq!(reply.text, "Post not found.");
	}

	#[tokio::test]
	async fn test_revoked_token_is_rejected() {
		let bot = bot().await;
		let identity = bot.gateway.authenticate(&bot.token).await.unwrap();

		bot.gateway.logout(&identity).await.unwrap();

		let error = bot.handle("/post").await.unwrap_err();
		assert!(matches!(error, Error::Auth(AuthError::InvalidToken)));
	}
}
