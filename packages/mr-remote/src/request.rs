use serde_json::Value;

use mr_domain::WireParams;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
	Get,
	Post,
	Put,
	Delete,
}
impl Method {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Get => "GET",
			Self::Post => "POST",
			Self::Put => "PUT",
			Self::Delete => "DELETE",
		}
	}
}
impl From<Method> for reqwest::Method {
	fn from(method: Method) -> Self {
		match method {
			Method::Get => Self::GET,
			Method::Post => Self::POST,
			Method::Put => Self::PUT,
			Method::Delete => Self::DELETE,
		}
	}
}

/// One call to the server: a method, a path template such as `/task/{id}/start`, the values for
/// its `{placeholders}`, query parameters and an optional JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
	method: Method,
	template: &'static str,
	vars: Vec<(&'static str, String)>,
	params: WireParams,
	body: Option<Value>,
}
impl ApiRequest {
	pub fn new(method: Method, template: &'static str) -> Self {
		Self { method, template, vars: Vec::new(), params: WireParams::default(), body: None }
	}

	pub fn get(template: &'static str) -> Self {
		Self::new(Method::Get, template)
	}

	pub fn post(template: &'static str) -> Self {
		Self::new(Method::Post, template)
	}

	pub fn put(template: &'static str) -> Self {
		Self::new(Method::Put, template)
	}

	pub fn delete(template: &'static str) -> Self {
		Self::new(Method::Delete, template)
	}

	pub fn var(mut self, name: &'static str, value: impl ToString) -> Self {
		self.vars.push((name, value.to_string()));

		self
	}

	pub fn params(mut self, params: WireParams) -> Self {
		self.params = params;

		self
	}

	pub fn param(mut self, key: &'static str, value: impl Into<String>) -> Self {
		self.params.insert(key, value);

		self
	}

	pub fn body(mut self, body: Value) -> Self {
		self.body = Some(body);

		self
	}

	pub fn method(&self) -> Method {
		self.method
	}

	pub fn template(&self) -> &'static str {
		self.template
	}

	pub fn var_value(&self, name: &str) -> Option<&str> {
		self.vars.iter().find(|(key, _)| *key == name).map(|(_, value)| value.as_str())
	}

	pub fn query(&self) -> &WireParams {
		&self.params
	}

	pub fn json_body(&self) -> Option<&Value> {
		self.body.as_ref()
	}

	/// The template with every placeholder substituted.
	pub fn path(&self) -> Result<String> {
		let mut out = String::with_capacity(self.template.len() + 16);
		let mut rest = self.template;

		while let Some(start) = rest.find('{') {
			let Some(len) = rest[start..].find('}') else {
				return Err(invalid(format!("Unclosed placeholder in {}.", self.template)));
			};
			let name = &rest[start + 1..start + len];
			let Some(value) = self.var_value(name) else {
				return Err(invalid(format!("Missing value for {{{name}}} in {}.", self.template)));
			};

			out.push_str(&rest[..start]);
			out.push_str(value);

			rest = &rest[start + len + 1..];
		}

		out.push_str(rest);

		Ok(out)
	}
}

fn invalid(message: String) -> Error {
	Error::InvalidRequest { message }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn renders_placeholders() {
		let request = ApiRequest::get("/tasks/box/{w}/{s}/{e}/{n}")
			.var("w", -1.5)
			.var("s", 50)
			.var("e", 0.5)
			.var("n", 51);

		assert_eq!(request.path().expect("Path must render."), "/tasks/box/-1.5/50/0.5/51");
	}

	#[test]
	fn missing_placeholder_is_an_error() {
		let err = ApiRequest::get("/task/{id}/start").path().expect_err("Must fail.");

		assert_eq!(err.to_string(), "Missing value for {id} in /task/{id}/start.");
	}
}
