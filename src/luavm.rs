use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::{Arc, LazyLock},
};

use library::LuaModule;
use mlua::prelude::*;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::session::{MapSession, SharedSession};
use parking_lot::{Mutex, ReentrantMutex};

pub mod library;

pub type SharedLuaVM = Arc<LuaVM>;

/// 虚拟机ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LuaVMId(u32);

impl IntoLua for LuaVMId {
    fn into_lua(self, lua: &Lua) -> LuaResult<LuaValue> {
        self.0.into_lua(lua)
    }
}

impl FromLua for LuaVMId {
    fn from_lua(value: LuaValue, lua: &Lua) -> LuaResult<Self> {
        Ok(LuaVMId(u32::from_lua(value, lua)?))
    }
}

impl LuaVMId {
    fn new() -> Self {
        Self(rand::random())
    }
}

/// Owns every script VM of a host together with the map session they
/// share.
pub struct LuaVMManager {
    inner: ReentrantMutex<RefCell<LuaVMManagerInner>>,
    /// 最近一次扫描的脚本目录
    last_load_dir: Mutex<Option<PathBuf>>,
    session: SharedSession,
}

impl LuaVMManager {
    pub fn new(session: SharedSession) -> Self {
        Self {
            inner: ReentrantMutex::new(RefCell::new(LuaVMManagerInner::default())),
            last_load_dir: Mutex::new(None),
            session,
        }
    }

    pub fn instance() -> &'static LuaVMManager {
        static INSTANCE: LazyLock<LuaVMManager> = LazyLock::new(|| {
            let config = Config::global().spawner.clone();
            LuaVMManager::new(MapSession::new(config).into_shared())
        });
        &INSTANCE
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    /// 创建一个不依赖lua文件的虚拟机，返回副本。
    ///
    /// name: 虚拟名称，用于标识虚拟机。会自动在前面加上 `virtual:`
    pub fn create_virtual_vm(&self, name: &str) -> Result<SharedLuaVM> {
        let virtual_name = format!("virtual:{}", name);
        let luavm = LuaVM::new_with_libs(&virtual_name, self.session.clone())?;
        let id = luavm.id();

        let luavm_shared = Arc::new(luavm);
        {
            let inner = self.inner.lock();
            inner
                .borrow_mut()
                .add_vm(id, &virtual_name, luavm_shared.clone());
        }

        Ok(luavm_shared)
    }

    /// 创建一个新的虚拟机并加载库和脚本，返回副本
    pub fn create_vm_with_file<P>(&self, script_path: P) -> Result<SharedLuaVM>
    where
        P: AsRef<Path>,
    {
        let file_name = script_path
            .as_ref()
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| {
                Error::InvalidValue("script file path", script_path.as_ref().display().to_string())
            })?;
        let path = script_path.as_ref().to_string_lossy().replace('\\', "/");
        log::debug!("Loading script file '{}'", path);

        let script_data = std::fs::read_to_string(&script_path).map_err(|e| {
            Error::IoWithContext(
                e,
                format!(
                    "Failed to read script file '{}'",
                    script_path.as_ref().display()
                ),
            )
        })?;

        let luavm = LuaVM::new_with_libs(&file_name, self.session.clone())?;
        let id = luavm.id();
        let luavm_shared = Arc::new(luavm);

        // register first so the script can already be found while it runs
        {
            let inner = self.inner.lock();
            inner
                .borrow_mut()
                .add_vm(id, &file_name, luavm_shared.clone());
        }

        if let Err(e) = luavm_shared.load_script(&script_data) {
            let inner = self.inner.lock();
            inner.borrow_mut().remove_vm(id);
            return Err(e.into());
        }

        Ok(luavm_shared)
    }

    /// 根据Lua实例获取虚拟机
    pub fn get_vm_by_lua(&self, lua: &Lua) -> Option<SharedLuaVM> {
        let luaid = Self::get_id_from_lua(lua).ok()?;
        let inner = self.inner.lock();
        let inner_b = inner.borrow();
        inner_b.vms.get(&luaid).cloned()
    }

    pub fn get_vm_by_name(&self, name: &str) -> Result<SharedLuaVM> {
        let inner = self.inner.lock();
        let inner_b = inner.borrow();
        inner_b
            .vm_names
            .get(name)
            .and_then(|id| inner_b.vms.get(id))
            .cloned()
            .ok_or(Error::LuaVMNotFound)
    }

    pub fn vm_count(&self) -> usize {
        self.inner.lock().borrow().vms.len()
    }

    /// 扫描路径并加载所有虚拟机
    pub fn auto_load_vms<P>(&self, dir_path: P) -> Result<Vec<LuaVMId>>
    where
        P: AsRef<Path>,
    {
        if !dir_path.as_ref().exists() {
            log::warn!(
                "Script directory '{}' not exists",
                dir_path.as_ref().display(),
            );
            return Ok(Vec::new());
        }

        {
            let disabled = Config::global().scripts.disabled_scripts.clone();
            let inner = self.inner.lock();
            let mut inner_b = inner.borrow_mut();
            for script in disabled {
                inner_b.disabled_vms.insert(script);
            }
        }

        let abs_path = std::fs::canonicalize(&dir_path).unwrap_or_default();
        log::info!("Scanning script directory '{}'", abs_path.display());

        let mut entries = std::fs::read_dir(&abs_path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        // 按文件名顺序加载
        entries.sort();

        let mut vms = Vec::new();
        for path in entries {
            if path.is_dir() {
                continue;
            }

            if path.extension() != Some("lua".as_ref()) {
                continue;
            }

            // 检查是否被禁用
            let file_name = path.file_name().unwrap_or_default().to_string_lossy();
            {
                let inner = self.inner.lock();
                if !inner.borrow().is_vm_name_enabled(file_name.as_ref()) {
                    log::debug!("Script file '{}' is disabled. Skipping.", file_name);
                    continue;
                }
            }

            match self.create_vm_with_file(&path) {
                Ok(vm) => vms.push(vm.id()),
                Err(e) => {
                    let err_msg = format!("Failed to load script '{}':\n{}", path.display(), e);
                    crate::error::set_last_error(err_msg.clone());
                    log::error!("{}", err_msg);
                }
            }
        }

        self.last_load_dir
            .lock()
            .replace(dir_path.as_ref().to_path_buf());

        Ok(vms)
    }

    /// 重新加载所有虚拟机
    ///
    /// The map session survives the reload.
    pub fn reload_physical_vms(&self) -> Result<()> {
        {
            let inner = self.inner.lock();
            inner.borrow_mut().remove_physical_vms();
        }

        let last_dir = self.last_load_dir.lock().clone();
        let dir = match last_dir {
            Some(dir) => dir,
            None => PathBuf::from(&Config::global().scripts.dir),
        };
        self.auto_load_vms(dir)?;

        Ok(())
    }

    /// 调用已设置的回调函数，无参数。
    pub fn invoke_fn(&self, fn_name: &str) {
        let inner = self.inner.lock();
        let inner_b = inner.borrow();
        for (_, luavm) in inner_b.iter_vms() {
            let globals = luavm.lua().globals();
            let Ok(fun) = globals.get::<LuaFunction>(format!("_{fn_name}")) else {
                continue;
            };
            if let Err(e) = fun.call::<()>(()) {
                let err_msg = format!("`{fn_name}` in LuaVM({}) error:\n{}", luavm.name(), e);
                crate::error::set_last_error(err_msg.clone());
                log::error!("{}", err_msg);
            };
        }
    }

    /// 标记脚本启用或禁用，下次加载或重载时生效
    pub fn set_script_enabled(&self, name: &str, enabled: bool) {
        let inner = self.inner.lock();
        let mut inner_b = inner.borrow_mut();
        if enabled {
            inner_b.disabled_vms.remove(name);
        } else {
            inner_b.disabled_vms.insert(name.to_string());
        }
    }

    /// 从Lua中获取虚拟机ID
    pub fn get_id_from_lua(lua: &Lua) -> LuaResult<LuaVMId> {
        lua.globals().get("_id")
    }
}

#[derive(Default)]
struct LuaVMManagerInner {
    vms: HashMap<LuaVMId, SharedLuaVM>,
    /// 记录虚拟机名称到id的映射
    vm_names: HashMap<String, LuaVMId>,
    /// 记录虚拟机是否禁用，记录脚本名以便重载时复用禁用表。
    disabled_vms: HashSet<String>,
}

impl LuaVMManagerInner {
    fn iter_vms(&self) -> impl Iterator<Item = (&LuaVMId, &SharedLuaVM)> {
        self.vms.iter()
    }

    fn is_vm_name_enabled(&self, name: &str) -> bool {
        !self.disabled_vms.contains(name)
    }

    fn add_vm(&mut self, id: LuaVMId, name: &str, vm: SharedLuaVM) {
        self.vms.insert(id, vm);
        self.vm_names.insert(name.to_string(), id);
    }

    fn remove_vm(&mut self, id: LuaVMId) {
        self.vms.remove(&id);
        self.vm_names.retain(|_, vm_id| *vm_id != id);
    }

    fn remove_physical_vms(&mut self) {
        // 清除错误信息
        crate::error::clear_last_error();

        self.vms.retain(|_, vm| vm.is_virtual());
        self.vm_names.retain(|_, id| self.vms.contains_key(id));
    }
}

pub struct LuaVM {
    id: LuaVMId,
    lua: Lua,
    name: String,
}

impl Drop for LuaVM {
    fn drop(&mut self) {
        // 执行 on_destroy 回调
        if let Err(e) = library::runtime::RuntimeModule::invoke_on_destroy(&self.lua) {
            log::error!(
                "Failed to invoke `on_destroy` in LuaVM({}):\n{}",
                self.name(),
                e
            );
        };

        log::debug!("LuaVM({}) removed", self.name());
    }
}

impl LuaVM {
    fn new_empty(name: &str) -> Result<Self> {
        let lua = Lua::new_with(
            LuaStdLib::ALL_SAFE,
            LuaOptions::default().catch_rust_panics(true),
        )?;

        Ok(Self {
            id: LuaVMId::new(),
            lua,
            name: name.to_string(),
        })
    }

    /// A VM with the runtime and spawner libraries bound to `session`.
    pub fn new_with_libs(name: &str, session: SharedSession) -> Result<Self> {
        let luavm = Self::new_empty(name)?;
        luavm.lua.set_app_data(session);
        luavm.load_libs()?;

        Ok(luavm)
    }

    pub fn id(&self) -> LuaVMId {
        self.id
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    /// 获取虚拟机脚本名称
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn session(&self) -> LuaResult<SharedSession> {
        library::spawner::SpawnerModule::session(&self.lua)
    }

    fn load_libs(&self) -> LuaResult<()> {
        let globals = self.lua.globals();

        globals.set("_id", self.id)?;
        globals.set("_name", self.name())?;
        // 设置模块搜索路径
        let scripts_dir = Config::global().scripts.dir.replace('\\', "/");
        let package: LuaTable = globals.get("package")?;
        let package_path: String = package.get("path")?;
        package.set("path", format!("{package_path};{scripts_dir}/?.lua"))?;

        library::runtime::RuntimeModule::register_library(&self.lua, &globals)?;
        library::spawner::SpawnerModule::register_library(&self.lua, &globals)?;

        Ok(())
    }

    /// 加载脚本
    pub fn load_script(&self, script: &str) -> LuaResult<()> {
        self.lua
            .load(script)
            .set_name(format!("={}", self.name()))
            .exec()
    }

    /// 是否是虚拟脚本
    pub fn is_virtual(&self) -> bool {
        self.name.starts_with("virtual:")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::SpawnerConfig;
    use crate::tests::init_logging;

    fn manager() -> LuaVMManager {
        LuaVMManager::new(MapSession::with_seed(SpawnerConfig::default(), 1).into_shared())
    }

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "monster_spawner_{}_{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_luavm_load_lua() {
        init_logging();

        let session = MapSession::with_seed(SpawnerConfig::default(), 1).into_shared();
        let vm = LuaVM::new_with_libs("virtual:test.lua", session).unwrap();

        vm.load_script("print('Hello, Lua!', { turn = 1 })").unwrap();

        let globals = vm.lua().globals();
        assert_eq!(globals.get::<String>("_name").unwrap(), "virtual:test.lua");
        assert!(vm.is_virtual());
        assert!(globals.get::<LuaTable>("Spawner").is_ok());
    }

    #[test]
    fn test_require_version() {
        init_logging();

        let manager = manager();
        let vm = manager.create_virtual_vm("version.lua").unwrap();
        vm.load_script(
            r#"
local major, minor, patch = core.version()
assert(major == 0 and minor == 1)
core.require_version(">=0.1")
"#,
        )
        .unwrap();

        assert!(vm.load_script(r#"core.require_version(">=99")"#).is_err());
    }

    #[test]
    fn test_manager_auto_load() {
        init_logging();

        let dir = scratch_dir("auto_load");
        std::fs::write(
            dir.join("a.lua"),
            "turns = 0\ncore.on_update(function() turns = turns + 1 end)",
        )
        .unwrap();
        std::fs::write(dir.join("broken.lua"), "this is not lua").unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let manager = manager();
        let loaded = manager.auto_load_vms(&dir).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(manager.vm_count(), 1);

        manager.invoke_fn("on_update");
        manager.invoke_fn("on_update");
        let vm = manager.get_vm_by_name("a.lua").unwrap();
        assert_eq!(vm.lua().globals().get::<i64>("turns").unwrap(), 2);
        assert!(Arc::ptr_eq(
            &manager.get_vm_by_lua(vm.lua()).unwrap(),
            &vm
        ));

        assert!(matches!(
            manager.get_vm_by_name("broken.lua"),
            Err(Error::LuaVMNotFound)
        ));
    }

    #[test]
    fn test_manager_reload() {
        init_logging();

        let dir = scratch_dir("reload");
        std::fs::write(dir.join("a.lua"), "x = 1").unwrap();
        std::fs::write(dir.join("b.lua"), "x = 2").unwrap();

        let manager = manager();
        let _virtual_vm = manager.create_virtual_vm("keep.lua").unwrap();
        manager.auto_load_vms(&dir).unwrap();
        assert_eq!(manager.vm_count(), 3);

        manager.set_script_enabled("b.lua", false);
        manager.reload_physical_vms().unwrap();

        assert_eq!(manager.vm_count(), 2);
        assert!(manager.get_vm_by_name("virtual:keep.lua").is_ok());
        assert!(manager.get_vm_by_name("b.lua").is_err());

        manager.set_script_enabled("b.lua", true);
        manager.reload_physical_vms().unwrap();
        assert_eq!(manager.vm_count(), 3);
        let b = manager.get_vm_by_name("b.lua").unwrap();
        assert_eq!(b.lua().globals().get::<i64>("x").unwrap(), 2);
    }

    #[test]
    fn test_vms_share_the_session() {
        init_logging();

        let manager = manager();
        let first = manager.create_virtual_vm("first.lua").unwrap();
        let second = manager.create_virtual_vm("second.lua").unwrap();

        manager.session().lock().register(5, 8);
        first
            .load_script("assert(Spawner.get_assignment(5) == 8)")
            .unwrap();
        second.load_script("Spawner.reset()").unwrap();
        assert_eq!(first.session().unwrap().lock().spawner_count(), 0);
    }
}
