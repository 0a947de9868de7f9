pub mod filelist_server;
