//! The request dispatcher (§4.2): decodes a request payload per its
//! opcode's schema, invokes the filing-system façade, and encodes the
//! result or a BBC `ERROR` response.
//!
//! Single-threaded per session by construction: [`Dispatcher::dispatch`]
//! takes `&mut Session` and is always awaited to completion by the caller
//! before the next request on that link is read (§4.2, §5 "Ordering
//! guarantees").

use tracing::{debug, instrument, warn};

use crate::error::BbcError;
use crate::fs::object::{Attr, ObjectType};
use crate::fs::openfile::MAX_FILE_SIZE;
use crate::fs::path::{parse_fqn, FilePath, Fqn};
use crate::fs::volume::{FsType, Volume};
use crate::fs::FileSystem;
use crate::proto::osfile::OsFileBlock;
use crate::proto::osgbpb::OsGbpbBlock;
use crate::proto::{encode_error, OsFileOp, OsGbpbOp, RequestOp, ResponseOp};
use crate::session::Session;

pub struct Dispatcher {
    pub fs: FileSystem,
    pub max_wrapped_payload: usize,
    /// The BBC-side ROM image served by `GET_ROM`, if one was configured.
    pub rom: Option<Vec<u8>>,
}

impl Dispatcher {
    pub fn new(fs: FileSystem, rom: Option<Vec<u8>>) -> Self {
        Self { fs, max_wrapped_payload: 65536, rom }
    }

    /// Dispatches one request, returning `(responseOpcode, payload)`. BBC
    /// filing-system errors are caught and encoded as `ERROR`; anything
    /// else propagates, terminating the session (§4.2 step 4).
    #[instrument(skip(self, session, payload), fields(opcode = opcode))]
    pub async fn dispatch(&self, session: &mut Session, opcode: u8, payload: &[u8]) -> (u8, Vec<u8>) {
        let Some(op) = RequestOp::from_byte(opcode) else {
            warn!(opcode, "unknown opcode");
            return (ResponseOp::Error.byte(), encode_error(0xFE, "Bad command"));
        };
        debug!(?op, payload_len = payload.len(), "dispatching");

        match self.handle(session, op, payload).await {
            Ok(response) => response,
            Err(err) => (ResponseOp::Error.byte(), encode_error(err.code(), &err.message())),
        }
    }

    async fn handle(&self, session: &mut Session, op: RequestOp, payload: &[u8]) -> Result<(u8, Vec<u8>), BbcError> {
        match op {
            RequestOp::GetRom => match &self.rom {
                Some(rom) => Ok((ResponseOp::Data.byte(), rom.clone())),
                None => Err(BbcError::NotSupported),
            },
            RequestOp::Reset => {
                session.handles.drain_all();
                Ok((ResponseOp::Yes.byte(), vec![]))
            }
            RequestOp::EchoData => Ok((ResponseOp::Data.byte(), payload.to_vec())),
            RequestOp::ReadString | RequestOp::ReadStringVerbose => {
                let max = *payload.first().unwrap_or(&0xFF) as usize;
                match session.read_server_string(max) {
                    Some(chunk) => Ok((ResponseOp::Data.byte(), chunk)),
                    None => Ok((ResponseOp::No.byte(), vec![])),
                }
            }
            RequestOp::StarCat => self.star_cat(session, payload).await,
            RequestOp::StarRun | RequestOp::StarCommand => self.star_command(session, payload).await,
            RequestOp::OsFile => self.os_file(session, payload).await,
            RequestOp::OsFindOpen => self.os_find_open(session, payload).await,
            RequestOp::OsFindClose => self.os_find_close(session, payload).await,
            RequestOp::OsArgs => self.os_args(session, payload).await,
            RequestOp::Eof => self.eof(session, payload),
            RequestOp::OsBGet => self.os_bget(session, payload),
            RequestOp::OsBPut => self.os_bput(session, payload),
            RequestOp::OsGbpb => self.os_gbpb(session, payload).await,
            RequestOp::Opt => {
                // X = option number, Y = value; only boot option (X=4) is meaningful here.
                if let (Some(&x), Some(&y)) = (payload.first(), payload.get(1)) {
                    if x == 4 {
                        session.boot_option = y;
                    }
                }
                Ok((ResponseOp::Yes.byte(), vec![]))
            }
            RequestOp::BootOption => Ok((ResponseOp::BootOption.byte(), vec![session.boot_option])),
            RequestOp::SetFileHandleRange => {
                let first = *payload.first().ok_or(BbcError::BadCommand)?;
                let count = *payload.get(1).ok_or(BbcError::BadCommand)?;
                let drained = session.handles.reconfigure(first, count);
                if !drained.is_empty() {
                    let volume = session.volume()?.clone();
                    for file in drained {
                        let _ = self.fs.flush(&volume, &file).await;
                    }
                }
                Ok((ResponseOp::Yes.byte(), vec![]))
            }
            RequestOp::Wrapped => self.wrapped(session, payload).await,
            RequestOp::ReadDiskImage | RequestOp::WriteDiskImage => Err(BbcError::NotSupported),
        }
    }

    /// Resolves the volume a path-bearing request should act on: an
    /// explicit `::name:` prefix (§4.3 "Volume parsing") re-selects and
    /// persists the session's current volume; otherwise the session's
    /// existing current volume applies.
    async fn resolve_volume(&self, session: &mut Session, path: &FilePath) -> Result<Volume, BbcError> {
        if path.volume_explicit {
            let name = path.volume.as_deref().unwrap_or_default();
            let volume = self.fs.find_volume(name).await?;
            session.volume = Some(volume.clone());
            Ok(volume)
        } else {
            Ok(session.volume()?.clone())
        }
    }

    async fn star_cat(&self, session: &mut Session, payload: &[u8]) -> Result<(u8, Vec<u8>), BbcError> {
        let cmdline = cr_terminated_string(payload);
        let raw_path = if cmdline.is_empty() { FilePath::default() } else { self.fs.parse_dir(&cmdline)? };
        let volume = self.resolve_volume(session, &raw_path).await?;
        let path = session.default_path(raw_path);
        let fqn = Fqn::with_name(path, "*".to_owned());
        let mut objects = self.fs.find_objects(&volume, &fqn).await?;
        objects.sort_by(|a, b| a.fqn.name.cmp(&b.fqn.name));
        let listing = objects.iter().map(|o| o.fqn.name.clone()).collect::<Vec<_>>().join(" ");
        session.set_server_string(listing);
        Ok((ResponseOp::Yes.byte(), vec![]))
    }

    /// Minimal `*`-command dispatch: filing-system-relevant commands are
    /// serviced directly; anything else is `BadCommand` (no on-BBC
    /// emulation, §9 "Ambiguity in source" / out-of-scope ROM).
    async fn star_command(&self, session: &mut Session, payload: &[u8]) -> Result<(u8, Vec<u8>), BbcError> {
        let cmdline = cr_terminated_string(payload);
        let mut parts = cmdline.split_whitespace();
        let command = parts.next().unwrap_or_default().to_uppercase();
        let volume = session.volume.clone();

        match command.as_str() {
            "*VOL" | "*VOLUME" => {
                let name = parts.next().ok_or(BbcError::BadCommand)?;
                let volume = self.fs.find_volume(name).await?;
                session.volume = Some(volume);
                Ok((ResponseOp::Yes.byte(), vec![]))
            }
            "*BACK" => {
                let volume = volume.ok_or_else(BbcError::no_volume)?;
                let (new_current, new_previous) = self.fs.swap_back(&volume, &session.current_dir, &session.previous_dir)?;
                session.current_dir = new_current;
                session.previous_dir = new_previous;
                Ok((ResponseOp::Yes.byte(), vec![]))
            }
            "*DIN" => {
                let volume = volume.ok_or_else(BbcError::no_volume)?;
                let drive = parts.next().ok_or(BbcError::BadCommand)?;
                let name = parts.next().ok_or(BbcError::BadCommand)?;
                self.fs.insert_disk(&volume, drive, name).await?;
                Ok((ResponseOp::Yes.byte(), vec![]))
            }
            "*DOUT" => {
                let volume = volume.ok_or_else(BbcError::no_volume)?;
                let drive = parts.next().ok_or(BbcError::BadCommand)?;
                self.fs.eject_disk(&volume, drive).await?;
                Ok((ResponseOp::Yes.byte(), vec![]))
            }
            "*HFOLDERS" => {
                let volume = volume.ok_or_else(BbcError::no_volume)?;
                let folders = self.fs.list_folders(&volume).await?;
                session.set_server_string(folders.join(" "));
                Ok((ResponseOp::Yes.byte(), vec![]))
            }
            "*HCF" => {
                let volume = volume.ok_or_else(BbcError::no_volume)?;
                let name = parts.next().ok_or(BbcError::BadCommand)?;
                self.fs.set_current_folder(&volume, name).await?;
                Ok((ResponseOp::Yes.byte(), vec![]))
            }
            "*HMKF" => {
                let volume = volume.ok_or_else(BbcError::no_volume)?;
                let name = parts.next().ok_or(BbcError::BadCommand)?;
                self.fs.make_folder(&volume, name).await?;
                Ok((ResponseOp::Yes.byte(), vec![]))
            }
            "*DCAT" => {
                let volume = volume.ok_or_else(BbcError::no_volume)?;
                let folder = parts.next();
                let disks = self.fs.list_disks(&volume, folder).await?;
                session.set_server_string(disks.join(" "));
                Ok((ResponseOp::Yes.byte(), vec![]))
            }
            "*DCREATE" => {
                let volume = volume.ok_or_else(BbcError::no_volume)?;
                let name = parts.next().ok_or(BbcError::BadCommand)?;
                self.fs.create_disk(&volume, name).await?;
                Ok((ResponseOp::Yes.byte(), vec![]))
            }
            "*CDIR" => {
                let name = parts.next().ok_or(BbcError::BadCommand)?;
                let fqn = self.fs.parse_file(name)?;
                let volume = self.resolve_volume(session, &fqn.path).await?;
                let fqn = session.default_fqn(fqn);
                self.fs.create_dir(&volume, &fqn).await?;
                Ok((ResponseOp::Yes.byte(), vec![]))
            }
            "*RENAME" => {
                let from = parts.next().ok_or(BbcError::BadCommand)?;
                let to = parts.next().ok_or(BbcError::BadCommand)?;
                let from_fqn = self.fs.parse_file(from)?;
                let volume = self.resolve_volume(session, &from_fqn.path).await?;
                let from_fqn = session.default_fqn(from_fqn);
                let to_fqn = session.default_fqn(self.fs.parse_file(to)?);
                let object = self.fs.get_object(&volume, &from_fqn, false).await?.ok_or(BbcError::FileNotFound)?;
                self.fs.rename(&volume, &object, &to_fqn).await?;
                Ok((ResponseOp::Yes.byte(), vec![]))
            }
            "*LOCATE" | "*LCAT" | "*LEX" => {
                let pattern = parts.next().ok_or(BbcError::BadCommand)?;
                let path = session.default_path(FilePath::default());
                let fqn = Fqn::with_name(path, pattern.to_owned());
                let found = self.fs.locate(&fqn).await?;
                let listing = found.iter().map(|(vol, obj)| format!("{}:{}", vol.name, obj.fqn.name)).collect::<Vec<_>>().join(" ");
                session.set_server_string(listing);
                Ok((ResponseOp::Yes.byte(), vec![]))
            }
            "*RUN" => {
                let name = parts.next().ok_or(BbcError::BadCommand)?;
                let fqn = parse_fqn(name)?;
                let volume = self.resolve_volume(session, &fqn.path).await?;
                let fqn = session.default_fqn(fqn);
                match self.fs.get_object(&volume, &fqn, false).await? {
                    Some(object) if object.object_type == ObjectType::File => {
                        Ok((ResponseOp::Run.byte(), object.fqn.name.into_bytes()))
                    }
                    _ => Err(BbcError::BadCommand),
                }
            }
            _ => Err(BbcError::BadCommand),
        }
    }

    async fn os_file(&self, session: &mut Session, payload: &[u8]) -> Result<(u8, Vec<u8>), BbcError> {
        if payload.is_empty() {
            return Err(BbcError::BadCommand);
        }
        let a = payload[0];
        let block_bytes: [u8; 16] = payload.get(1..17).ok_or(BbcError::BadCommand)?.try_into().unwrap();
        let block = OsFileBlock::decode(&block_bytes);
        let rest = &payload[17..];
        let (name, data) = split_cr_terminated(rest);

        let op = OsFileOp::from_byte(a).ok_or(BbcError::BadCommand)?;
        let fqn = parse_fqn(&name)?;
        let volume = self.resolve_volume(session, &fqn.path).await?;
        let fqn = session.default_fqn(fqn);

        let result = match op {
            OsFileOp::Save => {
                if data.len() as u64 > MAX_FILE_SIZE {
                    return Err(BbcError::TooBig);
                }
                self.fs.write_file(&volume, &fqn, block.load, block.exec, data).await?
            }
            OsFileOp::Create => {
                let zeroed = vec![0u8; block.size as usize];
                self.fs.write_file(&volume, &fqn, block.load, block.exec, &zeroed).await?
            }
            OsFileOp::WriteCat => {
                let object = self.fs.get_object(&volume, &fqn, false).await?.ok_or(BbcError::FileNotFound)?;
                self.fs.write_meta(&volume, &object, Some(block.load), Some(block.exec), Some(Attr::from_wire(block.attr))).await?
            }
            OsFileOp::WriteLoad => {
                let object = self.fs.get_object(&volume, &fqn, false).await?.ok_or(BbcError::FileNotFound)?;
                self.fs.write_meta(&volume, &object, Some(block.load), None, None).await?
            }
            OsFileOp::WriteExec => {
                let object = self.fs.get_object(&volume, &fqn, false).await?.ok_or(BbcError::FileNotFound)?;
                self.fs.write_meta(&volume, &object, None, Some(block.exec), None).await?
            }
            OsFileOp::WriteAttr => {
                let object = self.fs.get_object(&volume, &fqn, false).await?.ok_or(BbcError::FileNotFound)?;
                self.fs.write_meta(&volume, &object, None, None, Some(Attr::from_wire(block.attr))).await?
            }
            OsFileOp::ReadCat => match self.fs.get_object(&volume, &fqn, false).await? {
                Some(object) => object,
                None => return Ok(osfile_response(ObjectType::NotFound, &OsFileBlock::default())),
            },
            OsFileOp::Delete => match self.fs.get_object(&volume, &fqn, false).await? {
                Some(object) => {
                    let block = object_to_block(&object);
                    self.fs.delete(&volume, &object).await?;
                    return Ok(osfile_response(object.object_type, &block));
                }
                None => return Ok(osfile_response(ObjectType::NotFound, &OsFileBlock::default())),
            },
            OsFileOp::Load => {
                let object = self.fs.get_object(&volume, &fqn, false).await?.ok_or(BbcError::FileNotFound)?;
                let data = self.fs.read_bytes(&volume, &object).await?;
                let mut response = osfile_response(object.object_type, &object_to_block(&object));
                response.1.extend_from_slice(&data);
                return Ok(response);
            }
        };

        Ok(osfile_response(result.object_type, &object_to_block(&result)))
    }

    async fn os_find_open(&self, session: &mut Session, payload: &[u8]) -> Result<(u8, Vec<u8>), BbcError> {
        let a = *payload.first().ok_or(BbcError::BadCommand)?;
        let name = cr_terminated_string(&payload[1..]);
        let fqn = parse_fqn(&name)?;
        let volume = self.resolve_volume(session, &fqn.path).await?;
        let fqn = session.default_fqn(fqn);

        let write = a & 0x80 != 0;
        let read = a & 0x40 != 0 || !write;
        // PC volumes pass host files through unmodified on disk; host text
        // files use LF/CRLF conventions that need normalising to bare 0x0D
        // for a BBC reader (§4.3 "open"). No other adapter stores content
        // in a foreign line-ending convention.
        let text_prefix: Option<&[u8]> = if read && volume.fs_type == FsType::Pc { Some(b"") } else { None };
        let handle = self.fs.open(&volume, &fqn, read, write, text_prefix, &mut session.handles).await?;
        Ok((ResponseOp::OsFind.byte(), vec![handle]))
    }

    async fn os_find_close(&self, session: &mut Session, payload: &[u8]) -> Result<(u8, Vec<u8>), BbcError> {
        let handle = *payload.first().ok_or(BbcError::BadCommand)?;
        let volume = session.volume()?.clone();
        self.fs.close(&volume, handle, &mut session.handles).await?;
        Ok((ResponseOp::OsFind.byte(), vec![0]))
    }

    async fn os_args(&self, session: &mut Session, payload: &[u8]) -> Result<(u8, Vec<u8>), BbcError> {
        let a = *payload.first().ok_or(BbcError::BadCommand)?;
        let handle = *payload.get(1).ok_or(BbcError::BadCommand)?;
        let block = payload.get(2..6).unwrap_or(&[0, 0, 0, 0]);
        let value = u32::from_le_bytes(block.try_into().unwrap_or([0; 4]));

        if handle == 0 {
            let volume = session.volume()?.clone();
            self.fs.close(&volume, 0, &mut session.handles).await?;
            return Ok((ResponseOp::OsArgs.byte(), 0u32.to_le_bytes().to_vec()));
        }

        match a {
            0 => {
                let file = session.handles.get(handle)?;
                Ok((ResponseOp::OsArgs.byte(), (file.ptr as u32).to_le_bytes().to_vec()))
            }
            1 => {
                let file = session.handles.get_mut(handle)?;
                file.set_ptr(value as usize)?;
                Ok((ResponseOp::OsArgs.byte(), vec![]))
            }
            2 => {
                let file = session.handles.get(handle)?;
                Ok((ResponseOp::OsArgs.byte(), (file.contents.len() as u32).to_le_bytes().to_vec()))
            }
            _ => Err(BbcError::BadCommand),
        }
    }

    fn eof(&self, session: &mut Session, payload: &[u8]) -> Result<(u8, Vec<u8>), BbcError> {
        let handle = *payload.first().ok_or(BbcError::BadCommand)?;
        let file = session.handles.get(handle)?;
        let at_eof = file.ptr >= file.contents.len();
        Ok((ResponseOp::Eof.byte(), vec![if at_eof { 0xFF } else { 0 }]))
    }

    fn os_bget(&self, session: &mut Session, payload: &[u8]) -> Result<(u8, Vec<u8>), BbcError> {
        let handle = *payload.first().ok_or(BbcError::BadCommand)?;
        let file = session.handles.get_mut(handle)?;
        match file.bget()? {
            Some(byte) => Ok((ResponseOp::OsBGet.byte(), vec![byte])),
            None => Ok((ResponseOp::OsBGetEof.byte(), vec![])),
        }
    }

    fn os_bput(&self, session: &mut Session, payload: &[u8]) -> Result<(u8, Vec<u8>), BbcError> {
        let handle = *payload.first().ok_or(BbcError::BadCommand)?;
        let byte = *payload.get(1).ok_or(BbcError::BadCommand)?;
        let file = session.handles.get_mut(handle)?;
        file.bput(byte)?;
        Ok((ResponseOp::Yes.byte(), vec![]))
    }

    async fn os_gbpb(&self, session: &mut Session, payload: &[u8]) -> Result<(u8, Vec<u8>), BbcError> {
        let a = *payload.first().ok_or(BbcError::BadCommand)?;
        let block_bytes: [u8; 13] = payload.get(1..14).ok_or(BbcError::BadCommand)?.try_into().unwrap();
        let block = OsGbpbBlock::decode(&block_bytes);
        let data = &payload[14..];

        let op = OsGbpbOp::from_byte(a).ok_or(BbcError::BadCommand)?;
        match op {
            OsGbpbOp::WriteMultiple | OsGbpbOp::WriteMultipleNoPtr => {
                let update_ptr = matches!(op, OsGbpbOp::WriteMultiple);
                let file = session.handles.get_mut(block.handle)?;
                let ptr = if update_ptr { file.ptr } else { block.ptr as usize };
                let to_write = &data[..(block.num_bytes as usize).min(data.len())];
                file.write_at(ptr, to_write)?;
                if update_ptr {
                    file.ptr += to_write.len();
                }
                Ok((ResponseOp::OsGbpb.byte(), block.encode().to_vec()))
            }
            OsGbpbOp::ReadMultiple | OsGbpbOp::ReadMultipleNoPtr => {
                let update_ptr = matches!(op, OsGbpbOp::ReadMultiple);
                let file = session.handles.get_mut(block.handle)?;
                let ptr = if update_ptr { file.ptr } else { block.ptr as usize };
                let chunk = file.read_at(ptr, block.num_bytes as usize).to_vec();
                if update_ptr {
                    file.ptr = ptr + chunk.len();
                }
                let mut response = block.encode().to_vec();
                response.extend_from_slice(&chunk);
                Ok((ResponseOp::OsGbpb.byte(), response))
            }
            OsGbpbOp::GetTitleAndBootOpt => {
                let volume = session.volume()?;
                let mut out = volume.name.clone().into_bytes();
                out.push(session.boot_option);
                Ok((ResponseOp::OsGbpb.byte(), out))
            }
            OsGbpbOp::ReadCurrentDriveDir => {
                let mut out = session.current_drive.clone().into_bytes();
                out.push(b'.');
                out.extend_from_slice(session.current_dir.as_bytes());
                Ok((ResponseOp::OsGbpb.byte(), out))
            }
            OsGbpbOp::ReadLibraryDriveDir => {
                let mut out = session.library_drive.clone().into_bytes();
                out.push(b'.');
                out.extend_from_slice(session.library_dir.as_bytes());
                Ok((ResponseOp::OsGbpb.byte(), out))
            }
            OsGbpbOp::EnumerateNames => {
                let volume = session.volume()?.clone();
                let path = session.default_path(Default::default());
                let fqn = Fqn::with_name(path, "*".to_owned());
                let mut objects = self.fs.find_objects(&volume, &fqn).await?;
                objects.sort_by(|x, y| x.fqn.name.cmp(&y.fqn.name));
                let names = objects.iter().map(|o| o.fqn.name.clone()).collect::<Vec<_>>().join("\r");
                Ok((ResponseOp::OsGbpb.byte(), names.into_bytes()))
            }
        }
    }

    /// `WRAPPED`: a size-prefixed inner request, recursively dispatched and
    /// re-wrapped with its own size prefix (§6.1, §4.2).
    async fn wrapped(&self, session: &mut Session, payload: &[u8]) -> Result<(u8, Vec<u8>), BbcError> {
        if payload.len() < 5 {
            return Err(BbcError::BadCommand);
        }
        let max_payload = u32::from_le_bytes(payload[0..4].try_into().unwrap()) as usize;
        let inner_opcode = payload[4];
        let inner_payload = &payload[5..];
        if inner_payload.len() > max_payload.max(self.max_wrapped_payload) {
            return Err(BbcError::TooBig);
        }

        let (resp_opcode, resp_payload) = Box::pin(self.dispatch(session, inner_opcode, inner_payload)).await;
        let mut out = (resp_payload.len() as u32).to_le_bytes().to_vec();
        out.push(resp_opcode);
        out.extend_from_slice(&resp_payload);
        Ok((ResponseOp::Data.byte(), out))
    }
}

fn object_to_block(object: &crate::fs::object::FsObject) -> OsFileBlock {
    OsFileBlock { load: object.load, exec: object.exec, size: object.size as u32, attr: object.attr.bits() as u32 }
}

fn osfile_response(object_type: ObjectType, block: &OsFileBlock) -> (u8, Vec<u8>) {
    let mut out = vec![object_type as u8];
    out.extend_from_slice(&block.encode());
    (ResponseOp::OsFile.byte(), out)
}

/// Splits a CR (`0x0D`)-terminated command-line/name out of a payload,
/// returning the decoded string and the remaining bytes (inline data).
fn split_cr_terminated(payload: &[u8]) -> (String, &[u8]) {
    match payload.iter().position(|&b| b == 0x0D) {
        Some(pos) => (String::from_utf8_lossy(&payload[..pos]).into_owned(), &payload[pos + 1..]),
        None => (String::from_utf8_lossy(payload).into_owned(), &[]),
    }
}

fn cr_terminated_string(payload: &[u8]) -> String {
    split_cr_terminated(payload).0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_cr_terminated_name_from_data() {
        let payload = b"$.TEST\rHELLO";
        let (name, data) = split_cr_terminated(payload);
        assert_eq!(name, "$.TEST");
        assert_eq!(data, b"HELLO");
    }

    #[test]
    fn cr_terminated_string_without_trailing_data() {
        assert_eq!(cr_terminated_string(b"*CAT"), "*CAT");
    }
}
