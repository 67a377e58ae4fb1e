use {
    super::{Aes128Ctr, FrameKeys, HmacSha256, TAG_LEN_U64},
    crate::FinishWrite,
    ctr::cipher::StreamCipher,
    hmac::Mac,
    rand::{TryRngCore, rngs::OsRng},
    std::{
        cmp::min,
        io::{self, Read, Seek, SeekFrom, Take, Write},
    },
    tartarus_protocol::{Error, NONCE_LEN, Passphrase, Result, TAG_LEN},
    tempfile::SpooledTempFile,
    tracing::debug,
};

/// Max size of ciphertext that will be held in memory during decryption.
/// Larger frames are spilled to a temporary file on disk.
const MAX_IN_MEMORY: usize = 32 * 1024 * 1024;

/// Max length of a chunk that will be encrypted at once.
const BLOCK_SIZE: usize = 64 * 1024;

/// Encrypts everything written to it into an encrypted frame.
///
/// The nonce is written to the output on construction, ciphertext is written
/// as soon as plaintext arrives, and the tag is written by
/// [`finish`](FinishWrite::finish).
pub struct EncryptingWriter<W> {
    output: W,
    cipher: Aes128Ctr,
    mac: HmacSha256,
    // Ciphertext of the current chunk.
    buf: Vec<u8>,
}

impl<W: Write> EncryptingWriter<W> {
    pub fn new(mut output: W, passphrase: &Passphrase) -> Result<Self> {
        let keys = FrameKeys::derive(passphrase);
        let mut nonce = [0u8; NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|err| Error::Filesystem(io::Error::other(err)))?;
        let cipher = keys.cipher(&nonce);
        let mac = keys.mac()?;
        output.write_all(&nonce)?;
        Ok(Self {
            output,
            cipher,
            mac,
            buf: Vec::new(),
        })
    }
}

impl<W: Write> Write for EncryptingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = min(buf.len(), BLOCK_SIZE);
        let Some(chunk) = buf.get(..len) else {
            return Ok(0);
        };
        self.buf.clear();
        self.buf.extend_from_slice(chunk);
        self.cipher.apply_keystream(&mut self.buf);
        self.mac.update(&self.buf);
        self.output.write_all(&self.buf)?;
        Ok(len)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.output.flush()
    }
}

impl<W: Write> FinishWrite for EncryptingWriter<W> {
    type Inner = W;

    fn finish(mut self) -> Result<W> {
        let tag = self.mac.finalize().into_bytes();
        self.output.write_all(&tag)?;
        self.output.flush()?;
        Ok(self.output)
    }
}

/// Decrypts an encrypted frame.
///
/// The frame is read and authenticated by [`DecryptingReader::new`]; reading
/// from the returned value yields plaintext only if the tag matched.
pub struct DecryptingReader {
    ciphertext: Take<SpooledTempFile>,
    cipher: Aes128Ctr,
}

impl DecryptingReader {
    pub fn new(mut source: impl Read, passphrase: &Passphrase) -> Result<Self> {
        let keys = FrameKeys::derive(passphrase);
        let mut nonce = [0u8; NONCE_LEN];
        source.read_exact(&mut nonce).map_err(|err| {
            if err.kind() == io::ErrorKind::UnexpectedEof {
                Error::malformed("encrypted frame is shorter than its nonce")
            } else {
                err.into()
            }
        })?;

        let mut spooled = SpooledTempFile::new(MAX_IN_MEMORY);
        let stored_len = io::copy(&mut source, &mut spooled)?;
        let ciphertext_len = stored_len.checked_sub(TAG_LEN_U64).ok_or_else(|| {
            Error::malformed(format!(
                "encrypted frame is too short ({stored_len} bytes after the nonce)"
            ))
        })?;
        debug!(ciphertext_len, spilled = spooled.is_rolled(), "buffered encrypted frame");

        let mut mac = keys.mac()?;
        spooled.seek(SeekFrom::Start(0))?;
        let mut buf = vec![0u8; BLOCK_SIZE];
        let mut ciphertext = (&mut spooled).take(ciphertext_len);
        loop {
            let len = ciphertext.read(&mut buf)?;
            let Some(chunk) = buf.get(..len) else {
                return Err(Error::Filesystem(io::Error::other(
                    "reader returned invalid length",
                )));
            };
            if chunk.is_empty() {
                break;
            }
            mac.update(chunk);
        }
        let mut tag = [0u8; TAG_LEN];
        spooled.read_exact(&mut tag)?;
        if mac.verify_slice(&tag).is_err() {
            return Err(Error::AuthenticationFailure);
        }

        spooled.seek(SeekFrom::Start(0))?;
        Ok(Self {
            ciphertext: spooled.take(ciphertext_len),
            cipher: keys.cipher(&nonce),
        })
    }
}

impl Read for DecryptingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = self.ciphertext.read(buf)?;
        let chunk = buf
            .get_mut(..len)
            .ok_or_else(|| io::Error::other("reader returned invalid length"))?;
        self.cipher.apply_keystream(chunk);
        Ok(len)
    }
}
