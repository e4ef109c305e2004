use anyhow::Result;

#[derive(Clone, Debug)]
pub struct Credentials {
    pub username: Vec<u8>,
    pub password: Vec<u8>,
}

impl Credentials {
    ///
    ///
    ///
    pub fn new<S: Into<Vec<u8>>>(
        username: S,
        password: S,
    ) -> Self {
        let username = username.into();
        let password = password.into();

        Credentials { username, password }
    }

    /// Username/password sub-negotiation body, without the version byte.
    ///
    /// [rfc1929] https://tools.ietf.org/html/rfc1929
    pub fn as_socks_bytes(&self) -> Result<Vec<u8>> {
        ensure!(self.username.len() <= 255, "Username can be no longer than 255 bytes.");
        ensure!(self.password.len() <= 255, "Password can be no longer than 255 bytes.");

        // Append username
        let mut bytes = vec![self.username.len() as u8];
        bytes.extend(self.username.iter());

        // Append password
        bytes.push(self.password.len() as u8);
        bytes.extend(self.password.iter());

        Ok(bytes)
    }
}
